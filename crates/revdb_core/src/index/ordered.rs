//! Ordered secondary index implementation.

use crate::index::traits::{IndexKey, KeyExtractor, SecondaryIndex};
use crate::object::{ObjectId, ObjectKind};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;

/// B-tree based secondary index for ordered lookups and range queries.
///
/// Stores a mapping from extracted key to the set of object ids carrying
/// that key. A unique index rejects a second id under an occupied key.
pub struct OrderedIndex<T: ObjectKind, K: IndexKey> {
    name: &'static str,
    unique: bool,
    extract: KeyExtractor<T, K>,
    entries: BTreeMap<K, BTreeSet<ObjectId<T>>>,
}

impl<T: ObjectKind, K: IndexKey> OrderedIndex<T, K> {
    pub(crate) fn new(name: &'static str, unique: bool, extract: KeyExtractor<T, K>) -> Self {
        Self {
            name,
            unique,
            extract,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the ids mapped to `key`, in id order.
    #[must_use]
    pub fn ids(&self, key: &K) -> Vec<ObjectId<T>> {
        self.entries
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the ids whose keys fall within `range`, in key order.
    #[must_use]
    pub fn range_ids<R: RangeBounds<K>>(&self, range: R) -> Vec<ObjectId<T>> {
        self.entries
            .range(range)
            .flat_map(|(_, set)| set.iter().copied())
            .collect()
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

impl<T: ObjectKind, K: IndexKey> SecondaryIndex<T> for OrderedIndex<T, K> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_unique(&self) -> bool {
        self.unique
    }

    fn accepts(&self, obj: &T) -> bool {
        if !self.unique {
            return true;
        }
        match self.entries.get(&(self.extract)(obj)) {
            Some(set) => set.is_empty() || set.contains(&obj.id()),
            None => true,
        }
    }

    fn insert(&mut self, obj: &T) {
        self.entries
            .entry((self.extract)(obj))
            .or_default()
            .insert(obj.id());
    }

    fn remove(&mut self, obj: &T) {
        let key = (self.extract)(obj);
        if let Some(set) = self.entries.get_mut(&key) {
            set.remove(&obj.id());
            if set.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
