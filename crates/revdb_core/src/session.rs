//! Scoped undo sessions.
//!
//! A session is a scoped handle to the newest undo state. Three terminal
//! operations exist: `push` keeps the state on the stack, `squash` folds it
//! into the previous one, `undo` rolls it back. If none is invoked before
//! the handle drops, `undo` runs implicitly. The handles are move-only;
//! moving transfers the armed bit.

use crate::error::DbResult;
use crate::registry::AbstractIndex;
use std::mem;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// A scoped undo session over a single index.
///
/// Created through
/// [`IndexHandle::start_undo_session`](crate::registry::IndexHandle::start_undo_session)
/// or as a constituent of a composite [`Session`]. A session created with
/// `enabled = false` is born disarmed and reports revision `-1`.
pub struct IndexSession {
    index: Arc<dyn AbstractIndex>,
    revision: i64,
    armed: bool,
}

impl IndexSession {
    pub(crate) fn new(index: Arc<dyn AbstractIndex>, enabled: bool) -> Self {
        if enabled {
            let revision = index.push_undo_state();
            Self {
                index,
                revision,
                armed: true,
            }
        } else {
            Self {
                index,
                revision: -1,
                armed: false,
            }
        }
    }

    /// Leaves the undo state on the stack when the session goes out of
    /// scope.
    pub fn push(&mut self) {
        self.armed = false;
    }

    /// Combines this session's changes with the prior session's.
    pub fn squash(&mut self) {
        if mem::take(&mut self.armed) {
            self.index.squash();
        }
    }

    /// Rolls the session's changes back now.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::DbError::StateCorrupt`] from the index.
    pub fn undo(&mut self) -> DbResult<()> {
        if mem::take(&mut self.armed) {
            self.index.undo()?;
        }
        Ok(())
    }

    /// The revision this session represents, or `-1` if it never armed.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }
}

impl Drop for IndexSession {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.index.undo() {
                tracing::error!(
                    index = self.index.type_name(),
                    error = %e,
                    "drop-time rollback failed"
                );
            }
        }
    }
}

/// Decrements the database's live-session counter when dropped.
///
/// The counter stays raised for the whole lifetime of the session object,
/// push or no push; `resize` refuses to run while it is non-zero.
pub(crate) struct SessionTicket {
    counter: Arc<AtomicI32>,
}

impl SessionTicket {
    pub(crate) fn new(counter: Arc<AtomicI32>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A composite undo session spanning every registered index.
///
/// Issued by [`Database::start_undo_session`](crate::Database::start_undo_session).
/// The terminal operations fan out to each per-index session so the
/// database commits or rolls back all kinds together. Dropping the session
/// without a terminal call rolls every index back.
pub struct Session {
    sessions: Vec<IndexSession>,
    revision: i64,
    _ticket: SessionTicket,
}

impl Session {
    pub(crate) fn new(sessions: Vec<IndexSession>, ticket: SessionTicket) -> Self {
        let revision = sessions.first().map_or(-1, IndexSession::revision);
        Self {
            sessions,
            revision,
            _ticket: ticket,
        }
    }

    /// Retains every index's undo state for later undo/squash/commit.
    pub fn push(&mut self) {
        for session in &mut self.sessions {
            session.push();
        }
        self.sessions.clear();
    }

    /// Squashes every index's newest undo state into its predecessor.
    pub fn squash(&mut self) {
        for session in &mut self.sessions {
            session.squash();
        }
        self.sessions.clear();
    }

    /// Rolls every index back now.
    ///
    /// # Errors
    ///
    /// Propagates the first [`crate::DbError::StateCorrupt`]; remaining
    /// constituents still roll back when their handles drop.
    pub fn undo(&mut self) -> DbResult<()> {
        let mut sessions = mem::take(&mut self.sessions);
        for session in &mut sessions {
            session.undo()?;
        }
        Ok(())
    }

    /// The revision this session represents, or `-1` if it never armed.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{GenericIndex, IndexDefinition};
    use crate::object::{ObjectId, ObjectKind};
    use crate::registry::IndexHandle;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: ObjectId<Note>,
        text: String,
    }

    impl ObjectKind for Note {
        const TYPE_NUMBER: u16 = 4;

        fn id(&self) -> ObjectId<Self> {
            self.id
        }

        fn set_id(&mut self, id: ObjectId<Self>) {
            self.id = id;
        }
    }

    fn notes() -> Arc<IndexHandle<Note>> {
        Arc::new(IndexHandle::new(GenericIndex::new(&IndexDefinition::new())))
    }

    fn session_on(handle: &Arc<IndexHandle<Note>>, enabled: bool) -> IndexSession {
        IndexHandle::start_undo_session(handle, enabled)
    }

    fn add_note(handle: &Arc<IndexHandle<Note>>, text: &str) -> ObjectId<Note> {
        handle
            .write()
            .emplace(|id| Note {
                id,
                text: text.to_string(),
            })
            .unwrap()
            .id()
    }

    #[test]
    fn drop_rolls_back() {
        let handle = notes();
        {
            let _session = session_on(&handle, true);
            add_note(&handle, "ephemeral");
            assert_eq!(handle.read().len(), 1);
        }
        assert_eq!(handle.read().len(), 0);
        assert_eq!(handle.read().next_id().raw(), 0);
    }

    #[test]
    fn push_retains_the_state() {
        let handle = notes();
        {
            let mut session = session_on(&handle, true);
            add_note(&handle, "kept");
            session.push();
        }
        assert_eq!(handle.read().len(), 1);
        assert_eq!(handle.read().undo_depth(), 1);
    }

    #[test]
    fn explicit_undo_disarms() {
        let handle = notes();
        let mut session = session_on(&handle, true);
        add_note(&handle, "gone");
        session.undo().unwrap();
        assert_eq!(handle.read().len(), 0);
        // dropping after an explicit undo must not undo twice
        drop(session);
        assert_eq!(handle.read().revision(), 0);
    }

    #[test]
    fn disabled_session_is_inert() {
        let handle = notes();
        {
            let session = session_on(&handle, false);
            assert_eq!(session.revision(), -1);
            add_note(&handle, "permanent");
        }
        assert_eq!(handle.read().len(), 1);
        assert_eq!(handle.read().undo_depth(), 0);
    }

    #[test]
    fn moving_transfers_the_armed_bit() {
        let handle = notes();
        let session = session_on(&handle, true);
        add_note(&handle, "moved");

        let moved = session;
        drop(moved);
        assert_eq!(handle.read().len(), 0);
    }

    #[test]
    fn session_squash_folds_into_previous() {
        let handle = notes();
        let mut outer = session_on(&handle, true);
        add_note(&handle, "outer");

        {
            let mut inner = session_on(&handle, true);
            add_note(&handle, "inner");
            inner.squash();
        }

        assert_eq!(handle.read().undo_depth(), 1);
        assert_eq!(handle.read().len(), 2);

        outer.undo().unwrap();
        assert_eq!(handle.read().len(), 0);
    }

    #[test]
    fn ticket_counts_live_sessions() {
        let counter = Arc::new(AtomicI32::new(0));
        {
            let _a = SessionTicket::new(Arc::clone(&counter));
            let _b = SessionTicket::new(Arc::clone(&counter));
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
