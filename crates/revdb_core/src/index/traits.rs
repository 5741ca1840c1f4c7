//! Index traits and per-kind index definitions.

use crate::object::ObjectKind;
use std::any::Any;
use std::hash::Hash;

use super::hashed::HashedIndex;
use super::ordered::OrderedIndex;

/// A key that can be indexed.
///
/// Index keys must be hashable (for hashed indices), orderable (for ordered
/// indices), and cheaply clonable; keys are recomputed from objects via the
/// declared extractor, so they never need their own serialized form.
pub trait IndexKey: Clone + Eq + Hash + Ord + Send + Sync + 'static {}

impl<K: Clone + Eq + Hash + Ord + Send + Sync + 'static> IndexKey for K {}

/// Extracts a secondary key from an object.
///
/// Plain function pointers keep definitions trivially re-buildable when an
/// index is reattached from a segment image.
pub type KeyExtractor<T, K> = fn(&T) -> K;

/// A type-erased secondary index over one object kind.
///
/// Implemented by [`OrderedIndex`] and [`HashedIndex`]. The multi-index
/// container drives these through insert/remove/accepts; typed lookups
/// downcast through [`as_any`](Self::as_any).
pub trait SecondaryIndex<T: ObjectKind>: Send + Sync {
    /// Returns the index name, unique within its kind.
    fn name(&self) -> &'static str;

    /// Returns true if this index enforces uniqueness.
    fn is_unique(&self) -> bool;

    /// Returns true if inserting `obj` would not violate uniqueness.
    ///
    /// An entry already mapped to `obj`'s own id does not count as a
    /// conflict.
    fn accepts(&self, obj: &T) -> bool;

    /// Inserts the object's key mapping. The caller has already verified
    /// [`accepts`](Self::accepts).
    fn insert(&mut self, obj: &T);

    /// Removes the object's key mapping.
    fn remove(&mut self, obj: &T);

    /// Removes every entry.
    fn clear(&mut self);

    /// Returns self for typed downcasts.
    fn as_any(&self) -> &dyn Any;
}

type SecondaryFactory<T> = Box<dyn Fn() -> Box<dyn SecondaryIndex<T>> + Send + Sync>;

/// Declares the secondary indices of an object kind.
///
/// The definition is supplied at registration; when an index is reattached
/// from a segment image, the declared secondaries are rebuilt from the
/// stored objects rather than deserialized.
///
/// # Example
///
/// ```rust,ignore
/// let def = IndexDefinition::<Account>::new()
///     .ordered_unique("by_owner", |a: &Account| a.owner.clone())
///     .hashed_non_unique("by_region", |a: &Account| a.region);
/// ```
pub struct IndexDefinition<T: ObjectKind> {
    factories: Vec<SecondaryFactory<T>>,
}

impl<T: ObjectKind> IndexDefinition<T> {
    /// Creates a definition with no secondary indices.
    ///
    /// The primary index by id always exists and needs no declaration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Adds an ordered index that enforces key uniqueness.
    #[must_use]
    pub fn ordered_unique<K: IndexKey>(
        mut self,
        name: &'static str,
        extract: KeyExtractor<T, K>,
    ) -> Self {
        self.factories
            .push(Box::new(move || Box::new(OrderedIndex::new(name, true, extract))));
        self
    }

    /// Adds an ordered index that permits duplicate keys.
    #[must_use]
    pub fn ordered_non_unique<K: IndexKey>(
        mut self,
        name: &'static str,
        extract: KeyExtractor<T, K>,
    ) -> Self {
        self.factories
            .push(Box::new(move || Box::new(OrderedIndex::new(name, false, extract))));
        self
    }

    /// Adds a hashed index that enforces key uniqueness.
    #[must_use]
    pub fn hashed_unique<K: IndexKey>(
        mut self,
        name: &'static str,
        extract: KeyExtractor<T, K>,
    ) -> Self {
        self.factories
            .push(Box::new(move || Box::new(HashedIndex::new(name, true, extract))));
        self
    }

    /// Adds a hashed index that permits duplicate keys.
    #[must_use]
    pub fn hashed_non_unique<K: IndexKey>(
        mut self,
        name: &'static str,
        extract: KeyExtractor<T, K>,
    ) -> Self {
        self.factories
            .push(Box::new(move || Box::new(HashedIndex::new(name, false, extract))));
        self
    }

    /// Builds a fresh set of empty secondary indices.
    pub(crate) fn build(&self) -> Vec<Box<dyn SecondaryIndex<T>>> {
        self.factories.iter().map(|f| f()).collect()
    }
}

impl<T: ObjectKind> Default for IndexDefinition<T> {
    fn default() -> Self {
        Self::new()
    }
}
