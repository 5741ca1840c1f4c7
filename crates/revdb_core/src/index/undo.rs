//! Per-revision undo state.

use crate::object::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The reversible delta recorded for one revision.
///
/// For any id, at most one of `new_ids`, `old_values`, `removed_values`
/// holds it; the recording rules in
/// [`GenericIndex`](crate::index::GenericIndex) maintain that disjointness.
/// The whole state is serializable, so the undo stack survives a segment
/// flush and reopen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct UndoState<T: ObjectKind> {
    pub(crate) old_values: BTreeMap<ObjectId<T>, T>,
    pub(crate) removed_values: BTreeMap<ObjectId<T>, T>,
    pub(crate) new_ids: BTreeSet<ObjectId<T>>,
    pub(crate) old_next_id: ObjectId<T>,
    pub(crate) revision: i64,
}

impl<T: ObjectKind> UndoState<T> {
    pub(crate) fn new(old_next_id: ObjectId<T>, revision: i64) -> Self {
        Self {
            old_values: BTreeMap::new(),
            removed_values: BTreeMap::new(),
            new_ids: BTreeSet::new(),
            old_next_id,
            revision,
        }
    }

    /// Pre-images of objects modified (or later removed) in this revision.
    #[must_use]
    pub fn old_values(&self) -> &BTreeMap<ObjectId<T>, T> {
        &self.old_values
    }

    /// Pre-images of objects removed in this revision whose pre-image was
    /// not already captured by a modify.
    #[must_use]
    pub fn removed_values(&self) -> &BTreeMap<ObjectId<T>, T> {
        &self.removed_values
    }

    /// Ids created in this revision.
    #[must_use]
    pub fn new_ids(&self) -> &BTreeSet<ObjectId<T>> {
        &self.new_ids
    }

    /// The `next_id` as it was on entering this revision.
    #[must_use]
    pub fn old_next_id(&self) -> ObjectId<T> {
        self.old_next_id
    }

    /// The numeric revision this state represents.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Returns true when no id appears in more than one of the three
    /// change sets.
    #[must_use]
    pub fn is_disjoint(&self) -> bool {
        self.new_ids
            .iter()
            .all(|id| !self.old_values.contains_key(id) && !self.removed_values.contains_key(id))
            && self
                .old_values
                .keys()
                .all(|id| !self.removed_values.contains_key(id))
    }

    /// Returns true when this revision recorded no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old_values.is_empty() && self.removed_values.is_empty() && self.new_ids.is_empty()
    }
}
