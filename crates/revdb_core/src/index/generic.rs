//! Generic index: one object kind's container plus its undo engine.

use crate::error::{DbError, DbResult};
use crate::index::multi::MultiIndex;
use crate::index::traits::{IndexDefinition, IndexKey};
use crate::index::undo::UndoState;
use crate::object::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::mem;
use std::ops::RangeBounds;

/// The serialized form of a [`GenericIndex`], stored as one named record in
/// the segment. Secondary indices are not serialized; they are re-derived
/// from the declared definition on reattach.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub(crate) struct IndexImage<T: ObjectKind> {
    pub(crate) objects: Vec<T>,
    pub(crate) next_id: ObjectId<T>,
    pub(crate) revision: i64,
    pub(crate) stack: VecDeque<UndoState<T>>,
    pub(crate) size_of_value: u32,
    pub(crate) size_of_self: u32,
}

/// A multi-index container of one object kind with a stack of undo states.
///
/// The index owns id assignment (`next_id`), the current `revision`, and the
/// undo stack. While at least one undo state is on the stack, every mutation
/// records the reversible delta needed to restore the state at session
/// entry:
///
/// - a create records the new id;
/// - the first modify of an object records its pre-image;
/// - a remove records the pre-image, cancels a same-session create, or
///   promotes a previously captured modify pre-image.
///
/// `undo` plays the newest state backwards; `squash` merges the two newest
/// states without information loss; `commit` makes the oldest states
/// unrecoverable.
pub struct GenericIndex<T: ObjectKind> {
    indices: MultiIndex<T>,
    next_id: ObjectId<T>,
    revision: i64,
    stack: VecDeque<UndoState<T>>,
    size_of_value: u32,
    size_of_self: u32,
}

impl<T: ObjectKind> GenericIndex<T> {
    /// Creates an empty index with the declared secondary indices.
    #[must_use]
    pub fn new(definition: &IndexDefinition<T>) -> Self {
        Self {
            indices: MultiIndex::new(definition.build()),
            next_id: ObjectId::default(),
            revision: 0,
            stack: VecDeque::new(),
            size_of_value: mem::size_of::<T>() as u32,
            size_of_self: mem::size_of::<Self>() as u32,
        }
    }

    /// Reattaches an index from its segment image.
    ///
    /// The stored footprints are carried over untouched so that
    /// [`validate`](Self::validate) can compare them against the running
    /// binary.
    pub(crate) fn from_image(
        definition: &IndexDefinition<T>,
        image: IndexImage<T>,
    ) -> DbResult<Self> {
        let mut indices = MultiIndex::new(definition.build());
        indices.load(image.objects)?;
        Ok(Self {
            indices,
            next_id: image.next_id,
            revision: image.revision,
            stack: image.stack,
            size_of_value: image.size_of_value,
            size_of_self: image.size_of_self,
        })
    }

    /// Captures the index's full state for the segment.
    pub(crate) fn to_image(&self) -> IndexImage<T> {
        IndexImage {
            objects: self.indices.iter().cloned().collect(),
            next_id: self.next_id,
            revision: self.revision,
            stack: self.stack.clone(),
            size_of_value: self.size_of_value,
            size_of_self: self.size_of_self,
        }
    }

    /// Checks the footprints captured at creation time against the running
    /// binary.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::BinaryIncompatible`] on mismatch.
    pub fn validate(&self) -> DbResult<()> {
        if self.size_of_value != mem::size_of::<T>() as u32
            || self.size_of_self != mem::size_of::<Self>() as u32
        {
            return Err(DbError::binary_incompatible(T::type_name()));
        }
        Ok(())
    }

    /// Constructs a new object under the next available id.
    ///
    /// The constructor receives the assigned id; the index overwrites the
    /// object's id field afterwards regardless. On success `next_id`
    /// advances and, if a session is active, the id is recorded as created.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UniquenessViolation`] if a secondary constraint
    /// rejects the insert; `next_id` is not consumed in that case.
    pub fn emplace(&mut self, ctor: impl FnOnce(ObjectId<T>) -> T) -> DbResult<&T> {
        let new_id = self.next_id;
        let mut obj = ctor(new_id);
        obj.set_id(new_id);

        self.indices.insert(obj)?;
        self.next_id = self.next_id.next();
        if let Some(head) = self.stack.back_mut() {
            head.new_ids.insert(new_id);
        }

        self.indices
            .get(new_id)
            .ok_or_else(|| DbError::state_corrupt("freshly inserted object is missing"))
    }

    /// Applies `mutator` to the object at `id`.
    ///
    /// The pre-image is captured before the mutation (first write in the
    /// session only); a rejected mutation leaves the object untouched.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] for an unknown id,
    /// [`DbError::UniquenessViolation`] if secondary revalidation rejects
    /// the result.
    pub fn modify(&mut self, id: ObjectId<T>, mutator: impl FnOnce(&mut T)) -> DbResult<&T> {
        let pre = self
            .indices
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::not_found(format!("{} id {id}", T::type_name())))?;
        self.on_modify(&pre);
        self.indices.modify_in_place(id, mutator)?;
        self.indices
            .get(id)
            .ok_or_else(|| DbError::state_corrupt("modified object is missing"))
    }

    /// Removes the object at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id.
    pub fn remove(&mut self, id: ObjectId<T>) -> DbResult<()> {
        let pre = self
            .indices
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::not_found(format!("{} id {id}", T::type_name())))?;
        self.on_remove(&pre);
        self.indices.remove(id)?;
        Ok(())
    }

    /// Looks up an object by primary id.
    #[must_use]
    pub fn find(&self, id: ObjectId<T>) -> Option<&T> {
        self.indices.get(id)
    }

    /// Looks up an object by primary id, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] when no object has `id`.
    pub fn get(&self, id: ObjectId<T>) -> DbResult<&T> {
        self.find(id)
            .ok_or_else(|| DbError::not_found(format!("{} id {id}", T::type_name())))
    }

    /// Looks up the first object mapped to `key` in a named secondary index.
    #[must_use]
    pub fn find_by<K: IndexKey>(&self, index: &str, key: &K) -> Option<&T> {
        self.indices.find_by(index, key)
    }

    /// Like [`find_by`](Self::find_by) but failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] when the key maps to no object.
    pub fn get_by<K: IndexKey>(&self, index: &str, key: &K) -> DbResult<&T> {
        self.find_by(index, key)
            .ok_or_else(|| DbError::not_found(format!("{} key in '{index}'", T::type_name())))
    }

    /// Returns all ids mapped to `key` in a named secondary index.
    #[must_use]
    pub fn ids_by<K: IndexKey>(&self, index: &str, key: &K) -> Vec<ObjectId<T>> {
        self.indices.ids_by(index, key)
    }

    /// Returns the objects within `range` of a named ordered index.
    #[must_use]
    pub fn range_by<K: IndexKey, R: RangeBounds<K>>(&self, index: &str, range: R) -> Vec<&T> {
        self.indices.range_by(index, range)
    }

    /// Visits every live object in id order.
    pub fn inspect_objects(&self, mut inspector: impl FnMut(&T)) {
        for obj in self.indices.iter() {
            inspector(obj);
        }
    }

    /// Iterates over all live objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.indices.iter()
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true when the index holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The id the next create will be assigned.
    #[must_use]
    pub fn next_id(&self) -> ObjectId<T> {
        self.next_id
    }

    /// The current revision.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// The number of undo states on the stack.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.stack.len()
    }

    /// The newest undo state, if a session is active.
    #[must_use]
    pub fn head_undo_state(&self) -> Option<&UndoState<T>> {
        self.stack.back()
    }

    /// Iterates the undo stack, oldest first.
    pub fn undo_states(&self) -> impl Iterator<Item = &UndoState<T>> {
        self.stack.iter()
    }

    /// Pushes a fresh undo state and increments the revision.
    ///
    /// This is the primitive beneath
    /// [`Database::start_undo_session`](crate::Database::start_undo_session);
    /// the returned revision identifies the new state.
    pub fn begin_undo(&mut self) -> i64 {
        self.revision += 1;
        self.stack
            .push_back(UndoState::new(self.next_id, self.revision));
        self.revision
    }

    /// Restores the state to how it was prior to the current session,
    /// discarding all changes made in the newest revision.
    ///
    /// A no-op when no session is active.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::StateCorrupt`] if the container rejects a
    /// restore; this should be unreachable while the invariants hold and is
    /// fatal to the stack's consistency.
    pub fn undo(&mut self) -> DbResult<()> {
        let Some(head) = self.stack.pop_back() else {
            return Ok(());
        };

        for (id, pre) in head.old_values {
            self.indices
                .modify_in_place(id, move |obj| *obj = pre)
                .map_err(|e| {
                    DbError::state_corrupt(format!("could not restore modified object {id}: {e}"))
                })?;
        }

        for id in head.new_ids {
            self.indices.remove(id).map_err(|e| {
                DbError::state_corrupt(format!("could not erase created object {id}: {e}"))
            })?;
        }
        self.next_id = head.old_next_id;

        for (id, pre) in head.removed_values {
            self.indices.insert(pre).map_err(|e| {
                DbError::state_corrupt(format!("could not restore removed object {id}: {e}"))
            })?;
        }

        self.revision -= 1;
        Ok(())
    }

    /// Merges the change set of the two most recent revisions into one,
    /// reducing the head revision number.
    ///
    /// Only the undo buffer changes; the live data is untouched. With a
    /// single state on the stack the state is dropped without being rolled
    /// back, which is equivalent to committing the bottom-most revision.
    pub fn squash(&mut self) {
        if self.stack.len() == 1 {
            self.stack.pop_front();
            return;
        }
        let Some(head) = self.stack.pop_back() else {
            return;
        };
        let Some(prev) = self.stack.back_mut() else {
            return;
        };

        // Per-id merge of head (B) into prev (A). A cell already present in
        // A keeps A's entry; only B's novel information is copied forward.
        // The asserts flag compositions that violate causal timing.

        for (id, pre) in head.old_values {
            if prev.new_ids.contains(&id) {
                // new + upd -> new
                continue;
            }
            if prev.old_values.contains_key(&id) {
                // upd(X) + upd(Y) -> upd(X)
                continue;
            }
            // del + upd is impossible
            debug_assert!(!prev.removed_values.contains_key(&id));
            // nop + upd(Y) -> upd(Y)
            prev.old_values.insert(id, pre);
        }

        // nop + new -> new; the other rows of the "new" column are impossible
        // because ids are never reused
        for id in head.new_ids {
            debug_assert!(
                !prev.old_values.contains_key(&id) && !prev.removed_values.contains_key(&id)
            );
            prev.new_ids.insert(id);
        }

        for (id, pre) in head.removed_values {
            if prev.new_ids.remove(&id) {
                // new + del -> nop
                continue;
            }
            if let Some(old) = prev.old_values.remove(&id) {
                // upd(X) + del(Y) -> del(X)
                prev.removed_values.insert(id, old);
                continue;
            }
            // del + del is impossible
            debug_assert!(!prev.removed_values.contains_key(&id));
            // nop + del(Y) -> del(Y)
            prev.removed_values.insert(id, pre);
        }

        self.revision -= 1;
    }

    /// Discards all undo states at or below `revision`, making their
    /// changes unrecoverable.
    pub fn commit(&mut self, revision: i64) {
        while self
            .stack
            .front()
            .is_some_and(|state| state.revision <= revision)
        {
            self.stack.pop_front();
        }
    }

    /// Unwinds every undo state on the stack.
    ///
    /// # Errors
    ///
    /// Propagates the first [`DbError::StateCorrupt`] from an individual
    /// undo.
    pub fn undo_all(&mut self) -> DbResult<()> {
        while !self.stack.is_empty() {
            self.undo()?;
        }
        Ok(())
    }

    /// Aligns the revision of a freshly opened index with an externally
    /// tracked revision.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidState`] while undo states exist.
    pub fn set_revision(&mut self, revision: i64) -> DbResult<()> {
        if !self.stack.is_empty() {
            return Err(DbError::invalid_state(
                "cannot set revision while there is an existing undo stack",
            ));
        }
        self.revision = revision;
        Ok(())
    }

    fn on_modify(&mut self, pre: &T) {
        let Some(head) = self.stack.back_mut() else {
            return;
        };
        let id = pre.id();
        if head.new_ids.contains(&id) {
            return;
        }
        if head.old_values.contains_key(&id) {
            return;
        }
        head.old_values.insert(id, pre.clone());
    }

    fn on_remove(&mut self, pre: &T) {
        let Some(head) = self.stack.back_mut() else {
            return;
        };
        let id = pre.id();
        if head.new_ids.remove(&id) {
            // created and removed within the same session: net nop
            return;
        }
        if let Some(old) = head.old_values.remove(&id) {
            head.removed_values.insert(id, old);
            return;
        }
        if head.removed_values.contains_key(&id) {
            return;
        }
        head.removed_values.insert(id, pre.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: ObjectId<Account>,
        owner: String,
        balance: i64,
    }

    impl ObjectKind for Account {
        const TYPE_NUMBER: u16 = 1;

        fn id(&self) -> ObjectId<Self> {
            self.id
        }

        fn set_id(&mut self, id: ObjectId<Self>) {
            self.id = id;
        }
    }

    fn definition() -> IndexDefinition<Account> {
        IndexDefinition::<Account>::new().ordered_unique("by_owner", |a: &Account| a.owner.clone())
    }

    fn fresh() -> GenericIndex<Account> {
        GenericIndex::new(&definition())
    }

    fn create(idx: &mut GenericIndex<Account>, owner: &str, balance: i64) -> ObjectId<Account> {
        idx.emplace(|id| Account {
            id,
            owner: owner.to_string(),
            balance,
        })
        .unwrap()
        .id()
    }

    #[test]
    fn emplace_assigns_sequential_ids() {
        let mut idx = fresh();
        assert_eq!(create(&mut idx, "a", 1).raw(), 0);
        assert_eq!(create(&mut idx, "b", 2).raw(), 1);
        assert_eq!(idx.next_id().raw(), 2);
    }

    #[test]
    fn rejected_emplace_does_not_consume_id() {
        let mut idx = fresh();
        create(&mut idx, "a", 1);

        let err = idx
            .emplace(|id| Account {
                id,
                owner: "a".to_string(),
                balance: 2,
            })
            .unwrap_err();
        assert!(matches!(err, DbError::UniquenessViolation { .. }));
        assert_eq!(idx.next_id().raw(), 1);
    }

    #[test]
    fn modify_records_pre_image_once() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();
        idx.modify(id, |a| a.balance = 30).unwrap();

        let head = idx.head_undo_state().unwrap();
        assert_eq!(head.old_values().len(), 1);
        assert_eq!(head.old_values()[&id].balance, 10);
    }

    #[test]
    fn modify_of_new_object_records_nothing() {
        let mut idx = fresh();
        idx.begin_undo();
        let id = create(&mut idx, "a", 10);
        idx.modify(id, |a| a.balance = 20).unwrap();

        let head = idx.head_undo_state().unwrap();
        assert!(head.old_values().is_empty());
        assert!(head.new_ids().contains(&id));
    }

    #[test]
    fn undo_restores_modify() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();
        idx.modify(id, |a| a.balance = 30).unwrap();
        idx.undo().unwrap();

        assert_eq!(idx.get(id).unwrap().balance, 10);
        assert_eq!(idx.revision(), 0);
    }

    #[test]
    fn undo_erases_creates_and_restores_next_id() {
        let mut idx = fresh();
        idx.begin_undo();
        let id = create(&mut idx, "a", 100);
        idx.undo().unwrap();

        assert!(idx.find(id).is_none());
        assert_eq!(idx.next_id().raw(), 0);
    }

    #[test]
    fn undo_reinserts_removed() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.remove(id).unwrap();
        assert!(idx.find(id).is_none());

        idx.undo().unwrap();
        assert_eq!(idx.get(id).unwrap().balance, 10);
        // the reinserted object is reachable through its secondary keys
        assert_eq!(idx.get_by("by_owner", &"a".to_string()).unwrap().id(), id);
    }

    #[test]
    fn create_then_remove_is_net_nop() {
        let mut idx = fresh();
        idx.begin_undo();
        let id = create(&mut idx, "a", 10);
        idx.remove(id).unwrap();

        let head = idx.head_undo_state().unwrap();
        assert!(head.new_ids().is_empty());
        assert!(!head.old_values().contains_key(&id));
        assert!(!head.removed_values().contains_key(&id));
    }

    #[test]
    fn modify_then_remove_promotes_pre_image() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();
        idx.remove(id).unwrap();

        let head = idx.head_undo_state().unwrap();
        assert!(head.old_values().is_empty());
        assert_eq!(head.removed_values()[&id].balance, 10);

        idx.undo().unwrap();
        assert_eq!(idx.get(id).unwrap().balance, 10);
    }

    #[test]
    fn recording_stays_disjoint() {
        let mut idx = fresh();
        let keep = create(&mut idx, "a", 10);
        let doomed = create(&mut idx, "b", 20);

        idx.begin_undo();
        idx.modify(keep, |a| a.balance = 11).unwrap();
        idx.remove(doomed).unwrap();
        let fresh_id = create(&mut idx, "c", 30);
        idx.modify(fresh_id, |a| a.balance = 31).unwrap();

        assert!(idx.head_undo_state().unwrap().is_disjoint());
    }

    #[test]
    fn squash_merges_new_and_update() {
        let mut idx = fresh();

        idx.begin_undo();
        let id0 = create(&mut idx, "a", 10);
        // keep the first state: a second session nests on top
        idx.begin_undo();
        idx.modify(id0, |a| a.balance = 20).unwrap();
        let id1 = create(&mut idx, "b", 30);
        idx.squash();

        assert_eq!(idx.undo_depth(), 1);
        let head = idx.head_undo_state().unwrap();
        assert!(head.old_values().is_empty());
        assert!(head.new_ids().contains(&id0));
        assert!(head.new_ids().contains(&id1));

        idx.undo().unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.next_id().raw(), 0);
    }

    #[test]
    fn squash_update_update_keeps_older_pre_image() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();
        idx.begin_undo();
        idx.modify(id, |a| a.balance = 30).unwrap();
        idx.squash();

        let head = idx.head_undo_state().unwrap();
        assert_eq!(head.old_values()[&id].balance, 10);

        idx.undo().unwrap();
        assert_eq!(idx.get(id).unwrap().balance, 10);
    }

    #[test]
    fn squash_update_delete_keeps_older_pre_image() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);

        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();
        idx.begin_undo();
        idx.remove(id).unwrap();
        idx.squash();

        let head = idx.head_undo_state().unwrap();
        assert!(head.old_values().is_empty());
        assert_eq!(head.removed_values()[&id].balance, 10);

        idx.undo().unwrap();
        assert_eq!(idx.get(id).unwrap().balance, 10);
    }

    #[test]
    fn squash_single_state_discards_without_rollback() {
        let mut idx = fresh();
        idx.begin_undo();
        let id = create(&mut idx, "a", 10);
        idx.squash();

        // data stays, the revision stays, only the undo state is gone
        assert_eq!(idx.get(id).unwrap().balance, 10);
        assert_eq!(idx.undo_depth(), 0);
        assert_eq!(idx.revision(), 1);
    }

    #[test]
    fn squash_decrements_revision() {
        let mut idx = fresh();
        idx.begin_undo();
        idx.begin_undo();
        assert_eq!(idx.revision(), 2);

        idx.squash();
        assert_eq!(idx.revision(), 1);
        assert_eq!(idx.undo_depth(), 1);
    }

    #[test]
    fn commit_drops_states_from_the_front() {
        let mut idx = fresh();
        idx.begin_undo();
        create(&mut idx, "a", 1);
        idx.begin_undo();
        create(&mut idx, "b", 2);
        idx.begin_undo();
        create(&mut idx, "c", 3);

        idx.commit(2);
        assert_eq!(idx.undo_depth(), 1);
        assert_eq!(idx.head_undo_state().unwrap().revision(), 3);

        // committed revisions are unrecoverable
        idx.undo_all().unwrap();
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn undo_all_unwinds_everything() {
        let mut idx = fresh();
        idx.begin_undo();
        create(&mut idx, "a", 1);
        idx.begin_undo();
        create(&mut idx, "b", 2);

        idx.undo_all().unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.revision(), 0);
        assert_eq!(idx.next_id().raw(), 0);
    }

    #[test]
    fn set_revision_requires_empty_stack() {
        let mut idx = fresh();
        idx.begin_undo();
        assert!(matches!(
            idx.set_revision(10),
            Err(DbError::InvalidState { .. })
        ));

        idx.undo().unwrap();
        idx.set_revision(10).unwrap();
        assert_eq!(idx.revision(), 10);
    }

    #[test]
    fn undo_without_session_is_a_nop() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);
        idx.undo().unwrap();
        assert_eq!(idx.get(id).unwrap().balance, 10);
    }

    #[test]
    fn revision_contiguity_across_stack() {
        let mut idx = fresh();
        idx.set_revision(5).unwrap();
        idx.begin_undo();
        idx.begin_undo();
        idx.begin_undo();

        let revisions: Vec<i64> = idx.undo_states().map(|s| s.revision()).collect();
        assert_eq!(revisions, vec![6, 7, 8]);
        assert_eq!(idx.revision(), 8);
    }

    #[test]
    fn image_round_trip_preserves_undo_stack() {
        let mut idx = fresh();
        let id = create(&mut idx, "a", 10);
        idx.begin_undo();
        idx.modify(id, |a| a.balance = 20).unwrap();

        let image = idx.to_image();
        let bytes = bincode::serialize(&image).unwrap();
        let decoded: IndexImage<Account> = bincode::deserialize(&bytes).unwrap();
        let mut reopened = GenericIndex::from_image(&definition(), decoded).unwrap();

        reopened.validate().unwrap();
        assert_eq!(reopened.get(id).unwrap().balance, 20);
        assert_eq!(reopened.revision(), 1);
        assert_eq!(reopened.next_id().raw(), 1);

        // the persisted undo state still rolls back
        reopened.undo().unwrap();
        assert_eq!(reopened.get(id).unwrap().balance, 10);
    }

    #[test]
    fn validate_detects_foreign_footprint() {
        let mut idx = fresh();
        create(&mut idx, "a", 10);

        let mut image = idx.to_image();
        image.size_of_value += 8;
        let reopened = GenericIndex::from_image(&definition(), image).unwrap();
        assert!(matches!(
            reopened.validate(),
            Err(DbError::BinaryIncompatible { .. })
        ));
    }
}
