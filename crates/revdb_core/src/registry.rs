//! Type-erased index registry.
//!
//! The registry maps 16-bit registry keys to type-erased index handles.
//! Broadcast operations (undo, squash, commit, set-revision) iterate the
//! compact `index_list`; typed dispatch resolves through the dense
//! `index_map` and downcasts back to the concrete handle.

use crate::error::{DbError, DbResult};
use crate::index::{GenericIndex, IndexImage};
use crate::object::{ObjectId, ObjectKind};
use crate::session::IndexSession;
use crate::types::TypeId;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::sync::Arc;

/// Type-erased operations over one registered index.
///
/// Everything the database broadcasts over all kinds goes through this
/// trait; per-kind typed access downcasts to [`IndexHandle`] via
/// [`as_any`](Self::as_any).
pub trait AbstractIndex: Send + Sync {
    /// The packed type identifier of the indexed kind.
    fn type_id(&self) -> TypeId;

    /// The kind's type name; also its segment record key.
    fn type_name(&self) -> &'static str;

    /// The index's current revision.
    fn revision(&self) -> i64;

    /// Pushes a fresh undo state and returns the new revision.
    fn push_undo_state(&self) -> i64;

    /// Rolls back the newest undo state.
    fn undo(&self) -> DbResult<()>;

    /// Merges the two newest undo states.
    fn squash(&self);

    /// Discards undo states at or below `revision`.
    fn commit(&self, revision: i64);

    /// Unwinds the whole undo stack.
    fn undo_all(&self) -> DbResult<()>;

    /// Sets the revision; only valid with an empty undo stack.
    fn set_revision(&self, revision: i64) -> DbResult<()>;

    /// Removes the object with the given raw id.
    fn remove_object(&self, raw_id: i64) -> DbResult<()>;

    /// Checks the stored footprints against the running binary.
    fn validate(&self) -> DbResult<()>;

    /// Serializes the index's full state for the segment.
    fn image_bytes(&self) -> DbResult<Vec<u8>>;

    /// Number of live objects.
    fn object_count(&self) -> usize;

    /// Returns self for typed downcasts.
    fn as_any(&self) -> &dyn Any;
}

/// The concrete, lock-guarded handle around one [`GenericIndex`].
pub struct IndexHandle<T: ObjectKind> {
    inner: RwLock<GenericIndex<T>>,
}

impl<T: ObjectKind> IndexHandle<T> {
    pub(crate) fn new(index: GenericIndex<T>) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }

    /// Acquires shared access to the underlying index.
    pub fn read(&self) -> RwLockReadGuard<'_, GenericIndex<T>> {
        self.inner.read()
    }

    /// Acquires exclusive access to the underlying index.
    pub fn write(&self) -> RwLockWriteGuard<'_, GenericIndex<T>> {
        self.inner.write()
    }

    /// Starts a scoped undo session on this index alone.
    pub fn start_undo_session(handle: &Arc<Self>, enabled: bool) -> IndexSession {
        IndexSession::new(Arc::clone(handle) as Arc<dyn AbstractIndex>, enabled)
    }
}

impl<T: ObjectKind> AbstractIndex for IndexHandle<T> {
    fn type_id(&self) -> TypeId {
        T::type_id()
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn revision(&self) -> i64 {
        self.inner.read().revision()
    }

    fn push_undo_state(&self) -> i64 {
        self.inner.write().begin_undo()
    }

    fn undo(&self) -> DbResult<()> {
        self.inner.write().undo()
    }

    fn squash(&self) {
        self.inner.write().squash();
    }

    fn commit(&self, revision: i64) {
        self.inner.write().commit(revision);
    }

    fn undo_all(&self) -> DbResult<()> {
        self.inner.write().undo_all()
    }

    fn set_revision(&self, revision: i64) -> DbResult<()> {
        self.inner.write().set_revision(revision)
    }

    fn remove_object(&self, raw_id: i64) -> DbResult<()> {
        self.inner.write().remove(ObjectId::new(raw_id))
    }

    fn validate(&self) -> DbResult<()> {
        self.inner.read().validate()
    }

    fn image_bytes(&self) -> DbResult<Vec<u8>> {
        let image: IndexImage<T> = self.inner.read().to_image();
        bincode::serialize(&image).map_err(DbError::codec)
    }

    fn object_count(&self) -> usize {
        self.inner.read().len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Process-local table of registered indices.
///
/// `index_map` is dense over registry keys for constant-time typed lookup;
/// `index_list` is compact and preserves registration order for broadcast
/// iteration.
pub struct IndexRegistry {
    index_map: Vec<Option<Arc<dyn AbstractIndex>>>,
    index_list: Vec<Arc<dyn AbstractIndex>>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index_map: Vec::new(),
            index_list: Vec::new(),
        }
    }

    /// Registers an index under its registry key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateRegistration`] when the key is occupied.
    pub fn register(&mut self, index: Arc<dyn AbstractIndex>) -> DbResult<()> {
        let key = AbstractIndex::type_id(&*index).registry_key() as usize;
        if key >= self.index_map.len() {
            self.index_map.resize(key + 1, None);
        }
        if self.index_map[key].is_some() {
            return Err(DbError::duplicate_registration(
                index.type_name(),
                key as u16,
            ));
        }
        self.index_map[key] = Some(Arc::clone(&index));
        self.index_list.push(index);
        Ok(())
    }

    /// Returns true when an index occupies `key`.
    #[must_use]
    pub fn contains(&self, key: u16) -> bool {
        self.index_map
            .get(key as usize)
            .is_some_and(Option::is_some)
    }

    /// Looks up the type-erased handle at `key`.
    #[must_use]
    pub fn get(&self, key: u16) -> Option<&Arc<dyn AbstractIndex>> {
        self.index_map.get(key as usize).and_then(Option::as_ref)
    }

    /// Resolves the concrete handle for kind `T`.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when `T` is unregistered,
    /// [`DbError::InvalidState`] when the key is occupied by another kind.
    pub fn typed<T: ObjectKind>(&self) -> DbResult<&IndexHandle<T>> {
        let key = T::type_id().registry_key();
        let index = self
            .get(key)
            .ok_or_else(|| DbError::not_found(format!("no index registered for {}", T::type_name())))?;
        index
            .as_any()
            .downcast_ref::<IndexHandle<T>>()
            .ok_or_else(|| {
                DbError::invalid_state(format!(
                    "type_id {key} is registered to {}, not {}",
                    index.type_name(),
                    T::type_name()
                ))
            })
    }

    /// Iterates all registered indices in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AbstractIndex>> {
        self.index_list.iter()
    }

    /// The first registered index, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Arc<dyn AbstractIndex>> {
        self.index_list.first()
    }

    /// Number of registered indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index_list.len()
    }

    /// Returns true when no index is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_list.is_empty()
    }
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new()
    }
}
