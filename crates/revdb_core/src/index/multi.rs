//! Multi-index container of one object kind.

use crate::error::{DbError, DbResult};
use crate::index::hashed::HashedIndex;
use crate::index::ordered::OrderedIndex;
use crate::index::traits::{IndexKey, SecondaryIndex};
use crate::object::{ObjectId, ObjectKind};
use std::collections::BTreeMap;
use std::ops::RangeBounds;

/// A container keyed primarily by object id with user-declared secondary
/// indices.
///
/// Every mutation is atomic-or-reject: uniqueness constraints are verified
/// before anything changes, so a rejected insert or modify leaves the
/// container untouched.
pub struct MultiIndex<T: ObjectKind> {
    objects: BTreeMap<ObjectId<T>, T>,
    secondaries: Vec<Box<dyn SecondaryIndex<T>>>,
}

impl<T: ObjectKind> MultiIndex<T> {
    pub(crate) fn new(secondaries: Vec<Box<dyn SecondaryIndex<T>>>) -> Self {
        Self {
            objects: BTreeMap::new(),
            secondaries,
        }
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true when the container holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Looks up an object by primary id.
    #[must_use]
    pub fn get(&self, id: ObjectId<T>) -> Option<&T> {
        self.objects.get(&id)
    }

    /// Returns true if an object with `id` exists.
    #[must_use]
    pub fn contains(&self, id: ObjectId<T>) -> bool {
        self.objects.contains_key(&id)
    }

    /// Iterates over all objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.values()
    }

    /// Inserts an object under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UniquenessViolation`] if the id is taken or any
    /// unique secondary index rejects the object. Nothing is modified on
    /// failure.
    pub fn insert(&mut self, obj: T) -> DbResult<()> {
        let id = obj.id();
        if self.objects.contains_key(&id) {
            return Err(DbError::uniqueness_violation(T::type_name(), "primary"));
        }
        if let Some(bad) = self.secondaries.iter().find(|s| !s.accepts(&obj)) {
            return Err(DbError::uniqueness_violation(T::type_name(), bad.name()));
        }
        for secondary in &mut self.secondaries {
            secondary.insert(&obj);
        }
        self.objects.insert(id, obj);
        Ok(())
    }

    /// Applies `mutator` to the object at `id`, revalidating every secondary
    /// index against the mutated value.
    ///
    /// The mutation is applied to a copy first; on rejection the stored
    /// object and all index entries are exactly as they were.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] if no object has `id`.
    /// - [`DbError::InvalidState`] if the mutator changes the object's id.
    /// - [`DbError::UniquenessViolation`] if a unique index rejects the
    ///   mutated value.
    pub fn modify_in_place(
        &mut self,
        id: ObjectId<T>,
        mutator: impl FnOnce(&mut T),
    ) -> DbResult<()> {
        let current = match self.objects.get(&id) {
            Some(obj) => obj.clone(),
            None => return Err(DbError::not_found(format!("{} id {id}", T::type_name()))),
        };

        let mut updated = current.clone();
        mutator(&mut updated);
        if updated.id() != id {
            return Err(DbError::invalid_state(
                "mutator must not change the object id",
            ));
        }

        for secondary in &mut self.secondaries {
            secondary.remove(&current);
        }
        if let Some(bad) = self.secondaries.iter().find(|s| !s.accepts(&updated)) {
            let index = bad.name();
            for secondary in &mut self.secondaries {
                secondary.insert(&current);
            }
            return Err(DbError::uniqueness_violation(T::type_name(), index));
        }
        for secondary in &mut self.secondaries {
            secondary.insert(&updated);
        }
        self.objects.insert(id, updated);
        Ok(())
    }

    /// Removes and returns the object at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no object has `id`.
    pub fn remove(&mut self, id: ObjectId<T>) -> DbResult<T> {
        let obj = self
            .objects
            .remove(&id)
            .ok_or_else(|| DbError::not_found(format!("{} id {id}", T::type_name())))?;
        for secondary in &mut self.secondaries {
            secondary.remove(&obj);
        }
        Ok(obj)
    }

    /// Returns the ids mapped to `key` in the named secondary index.
    ///
    /// Empty when the index does not exist, holds a different key type, or
    /// has no entry for `key`.
    #[must_use]
    pub fn ids_by<K: IndexKey>(&self, index: &str, key: &K) -> Vec<ObjectId<T>> {
        for secondary in &self.secondaries {
            if secondary.name() != index {
                continue;
            }
            if let Some(ordered) = secondary.as_any().downcast_ref::<OrderedIndex<T, K>>() {
                return ordered.ids(key);
            }
            if let Some(hashed) = secondary.as_any().downcast_ref::<HashedIndex<T, K>>() {
                return hashed.ids(key);
            }
        }
        Vec::new()
    }

    /// Looks up the first object mapped to `key` in the named secondary
    /// index.
    #[must_use]
    pub fn find_by<K: IndexKey>(&self, index: &str, key: &K) -> Option<&T> {
        self.ids_by(index, key)
            .into_iter()
            .next()
            .and_then(|id| self.objects.get(&id))
    }

    /// Returns the objects whose keys fall within `range` in the named
    /// ordered index, in key order.
    #[must_use]
    pub fn range_by<K: IndexKey, R: RangeBounds<K>>(&self, index: &str, range: R) -> Vec<&T> {
        for secondary in &self.secondaries {
            if secondary.name() != index {
                continue;
            }
            if let Some(ordered) = secondary.as_any().downcast_ref::<OrderedIndex<T, K>>() {
                return ordered
                    .range_ids(range)
                    .into_iter()
                    .filter_map(|id| self.objects.get(&id))
                    .collect();
            }
        }
        Vec::new()
    }

    /// Clears and re-derives every secondary index from the live objects.
    ///
    /// Used after the primary map has been bulk-loaded from a segment image.
    pub(crate) fn rebuild_secondaries(&mut self) {
        let Self {
            objects,
            secondaries,
        } = self;
        for secondary in secondaries.iter_mut() {
            secondary.clear();
            for obj in objects.values() {
                secondary.insert(obj);
            }
        }
    }

    /// Bulk-loads objects without uniqueness checks beyond the primary key.
    ///
    /// Only for reattaching a segment image, whose content was consistent
    /// when flushed.
    pub(crate) fn load(&mut self, objects: Vec<T>) -> DbResult<()> {
        for obj in objects {
            let id = obj.id();
            if self.objects.insert(id, obj).is_some() {
                return Err(DbError::state_corrupt(format!(
                    "segment image contains duplicate {} id {id}",
                    T::type_name()
                )));
            }
        }
        self.rebuild_secondaries();
        Ok(())
    }
}
