//! Hashed secondary index implementation.

use crate::index::traits::{IndexKey, KeyExtractor, SecondaryIndex};
use crate::object::{ObjectId, ObjectKind};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};

/// Hash-based secondary index for O(1) equality lookups.
///
/// The id sets are ordered so lookups are deterministic regardless of hash
/// iteration order.
pub struct HashedIndex<T: ObjectKind, K: IndexKey> {
    name: &'static str,
    unique: bool,
    extract: KeyExtractor<T, K>,
    entries: HashMap<K, BTreeSet<ObjectId<T>>>,
}

impl<T: ObjectKind, K: IndexKey> HashedIndex<T, K> {
    pub(crate) fn new(name: &'static str, unique: bool, extract: KeyExtractor<T, K>) -> Self {
        Self {
            name,
            unique,
            extract,
            entries: HashMap::new(),
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

    /// Returns true if any object carries `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

impl<T: ObjectKind, K: IndexKey> SecondaryIndex<T> for HashedIndex<T, K> {
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
