//! Object identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Unique identifier for an object, tagged by its owning kind.
///
/// Object ids are 64-bit integers assigned sequentially by the generic
/// index. They are:
/// - Monotonically increasing within a kind
/// - Never reused, even after a rollback (undo may leave gaps)
/// - The only sanctioned way for objects to reference each other
///
/// The kind tag is purely compile-time; two ids of different kinds with the
/// same raw value are distinct types and cannot be confused.
pub struct ObjectId<T> {
    raw: i64,
    _kind: PhantomData<fn() -> T>,
}

impl<T> ObjectId<T> {
    /// Creates an object id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.raw
    }

    /// Returns the id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::new(self.raw + 1)
    }
}

impl<T> Clone for ObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectId<T> {}

impl<T> Default for ObjectId<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> PartialEq for ObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ObjectId<T> {}

impl<T> PartialOrd for ObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ObjectId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for ObjectId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.raw)
    }
}

impl<T> fmt::Display for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T> From<i64> for ObjectId<T> {
    fn from(raw: i64) -> Self {
        Self::new(raw)
    }
}

impl<T> From<ObjectId<T>> for i64 {
    fn from(id: ObjectId<T>) -> Self {
        id.raw
    }
}

impl<T> Serialize for ObjectId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.raw)
    }
}

impl<'de, T> Deserialize<'de> for ObjectId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::new)
    }
}
