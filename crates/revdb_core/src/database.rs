//! Database facade.

use crate::config::{Config, OpenMode};
use crate::error::{DbError, DbResult};
use crate::index::{GenericIndex, IndexDefinition, IndexImage, IndexKey};
use crate::lock::{HoldGuard, LockManager, LockState};
use crate::object::{ObjectId, ObjectKind};
use crate::registry::{AbstractIndex, IndexHandle, IndexRegistry};
use crate::segment::Segment;
use crate::session::{IndexSession, Session, SessionTicket};
use crate::stats::{DatabaseStats, StatsSnapshot};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-attempt wait of the strong write-lock path, in microseconds.
const STRONG_WRITE_WAIT_MICRO: u64 = 1_000_000;
/// Retry budget of the strong write-lock path.
const STRONG_WRITE_RETRIES: u32 = 100_000;

/// The main database handle.
///
/// `Database` is the public entry point: it owns the segment, the index
/// registry, the reader-writer lock manager, and the tuning knobs. Object
/// kinds are registered with [`add_index`](Self::add_index); mutations are
/// grouped into scoped undo sessions issued by
/// [`start_undo_session`](Self::start_undo_session).
///
/// # Opening a Database
///
/// ```rust,ignore
/// use revdb_core::{Config, Database, IndexDefinition, OpenMode};
///
/// let db = Database::open(Path::new("data"), OpenMode::ReadWrite, 64 << 20)?;
/// db.add_index::<Account>(
///     IndexDefinition::new().ordered_unique("by_owner", |a: &Account| a.owner.clone()),
/// )?;
///
/// let mut session = db.start_undo_session(true)?;
/// let acct = db.create::<Account>(|id| Account { id, owner: "alice".into(), balance: 100 })?;
/// session.push();
/// db.commit(db.revision())?;
/// db.flush()?;
/// ```
///
/// # In-Memory Databases
///
/// For tests, use [`Database::open_in_memory`]; it behaves like a writable
/// database whose files never touch disk.
pub struct Database {
    config: RwLock<Config>,
    segment: RwLock<Segment>,
    registry: RwLock<IndexRegistry>,
    lock_manager: LockManager,
    lock_state: LockState,
    undo_session_count: Arc<AtomicI32>,
    stats: DatabaseStats,
    data_dir: Option<PathBuf>,
    read_only: bool,
    is_open: AtomicBool,
}

impl Database {
    /// Opens a database directory with default configuration.
    ///
    /// `size` is the creation size for a new database, or the grow target
    /// for an existing one (write mode only).
    ///
    /// # Errors
    ///
    /// See [`Segment::open_dir`] for the open-time failure modes:
    /// `NotFound`, `GrowthRefused`, `EnvironmentMismatch`, `AlreadyLocked`.
    pub fn open(dir: &Path, mode: OpenMode, size: u64) -> DbResult<Self> {
        Self::open_with_config(dir, mode, size, Config::default())
    }

    /// Opens a database directory with custom configuration.
    pub fn open_with_config(
        dir: &Path,
        mode: OpenMode,
        size: u64,
        config: Config,
    ) -> DbResult<Self> {
        let segment = Segment::open_dir(dir, mode, size)?;
        let read_only = mode == OpenMode::ReadOnly;
        tracing::info!(dir = %dir.display(), ?mode, size, "opened database");
        Ok(Self::assemble(segment, config, Some(dir.to_path_buf()), read_only))
    }

    /// Opens a fresh in-memory database for testing.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens a fresh in-memory database with custom configuration.
    pub fn open_in_memory_with_config(config: Config) -> DbResult<Self> {
        Ok(Self::assemble(Segment::in_memory(), config, None, false))
    }

    fn assemble(
        segment: Segment,
        config: Config,
        data_dir: Option<PathBuf>,
        read_only: bool,
    ) -> Self {
        let lock_state = LockState::new(config.require_locking);
        Self {
            config: RwLock::new(config),
            segment: RwLock::new(segment),
            registry: RwLock::new(IndexRegistry::new()),
            lock_manager: LockManager::new(),
            lock_state,
            undo_session_count: Arc::new(AtomicI32::new(0)),
            stats: DatabaseStats::new(),
            data_dir,
            read_only,
            is_open: AtomicBool::new(true),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers the object kind `T` with its declared secondary indices.
    ///
    /// Inside a writable segment the index is constructed on first use; on
    /// reopen it is located under the kind's type-name record and its
    /// stored footprints are validated against the running binary.
    ///
    /// # Errors
    ///
    /// - [`DbError::DuplicateRegistration`] if `T`'s registry key is taken.
    /// - [`DbError::NotFound`] if the index is absent in a read-only
    ///   database.
    /// - [`DbError::BinaryIncompatible`] on a footprint mismatch.
    pub fn add_index<T: ObjectKind>(&self, definition: IndexDefinition<T>) -> DbResult<()> {
        self.ensure_open()?;

        let key = T::type_id().registry_key();
        let mut registry = self.registry.write();
        if registry.contains(key) {
            return Err(DbError::duplicate_registration(T::type_name(), key));
        }

        let segment = self.segment.read();
        let index = match segment.record(T::type_name()) {
            Some(bytes) => {
                let image: IndexImage<T> =
                    bincode::deserialize(bytes).map_err(DbError::codec)?;
                let index = GenericIndex::from_image(&definition, image)?;
                index.validate()?;
                index
            }
            None => {
                if self.read_only {
                    return Err(DbError::not_found(format!(
                        "unable to find index for {} in read only database",
                        T::type_name()
                    )));
                }
                GenericIndex::new(&definition)
            }
        };
        drop(segment);

        registry.register(Arc::new(IndexHandle::new(index)))?;
        tracing::debug!(type_name = T::type_name(), type_id = key, "registered index");
        Ok(())
    }

    /// Returns true when kind `T` is registered on this handle.
    #[must_use]
    pub fn has_index<T: ObjectKind>(&self) -> bool {
        self.registry.read().contains(T::type_id().registry_key())
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Creates an object of kind `T` under the next available id.
    ///
    /// The constructor receives the assigned id. Returns an owned copy of
    /// the stored object.
    ///
    /// # Errors
    ///
    /// [`DbError::UniquenessViolation`] if a secondary constraint rejects
    /// the insert; the id is not consumed in that case.
    pub fn create<T: ObjectKind>(&self, ctor: impl FnOnce(ObjectId<T>) -> T) -> DbResult<T> {
        self.ensure_open()?;
        self.require_write_lock("create", T::type_name())?;
        let registry = self.registry.read();
        let obj = registry.typed::<T>()?.write().emplace(ctor)?.clone();
        self.stats.record_create();
        Ok(obj)
    }

    /// Applies `mutator` to the object of kind `T` at `id` and returns an
    /// owned copy of the post-image.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] for an unknown id,
    /// [`DbError::UniquenessViolation`] if revalidation rejects the result
    /// (the object is left untouched).
    pub fn modify<T: ObjectKind>(
        &self,
        id: ObjectId<T>,
        mutator: impl FnOnce(&mut T),
    ) -> DbResult<T> {
        self.ensure_open()?;
        self.require_write_lock("modify", T::type_name())?;
        let registry = self.registry.read();
        let obj = registry.typed::<T>()?.write().modify(id, mutator)?.clone();
        self.stats.record_modify();
        Ok(obj)
    }

    /// Removes the given object.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when the object is not live.
    pub fn remove<T: ObjectKind>(&self, obj: &T) -> DbResult<()> {
        self.remove_object::<T>(obj.id())
    }

    /// Removes the object of kind `T` at `id`.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] for an unknown id.
    pub fn remove_object<T: ObjectKind>(&self, id: ObjectId<T>) -> DbResult<()> {
        self.ensure_open()?;
        self.require_write_lock("remove", T::type_name())?;
        let registry = self.registry.read();
        registry.typed::<T>()?.write().remove(id)?;
        self.stats.record_remove();
        Ok(())
    }

    /// Looks up an object by primary id, returning an owned copy.
    pub fn find<T: ObjectKind>(&self, id: ObjectId<T>) -> DbResult<Option<T>> {
        self.ensure_open()?;
        self.require_read_lock("find", T::type_name())?;
        let registry = self.registry.read();
        let obj = registry.typed::<T>()?.read().find(id).cloned();
        self.stats.record_read();
        Ok(obj)
    }

    /// Looks up an object by primary id, failing when absent.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when no object has `id`.
    pub fn get<T: ObjectKind>(&self, id: ObjectId<T>) -> DbResult<T> {
        self.find(id)?
            .ok_or_else(|| DbError::not_found(format!("{} id {id}", T::type_name())))
    }

    /// Looks up the first object mapped to `key` in a named secondary
    /// index.
    pub fn find_by<T: ObjectKind, K: IndexKey>(
        &self,
        index: &str,
        key: &K,
    ) -> DbResult<Option<T>> {
        self.ensure_open()?;
        self.require_read_lock("find_by", T::type_name())?;
        let registry = self.registry.read();
        let obj = registry.typed::<T>()?.read().find_by(index, key).cloned();
        self.stats.record_read();
        Ok(obj)
    }

    /// Like [`find_by`](Self::find_by) but failing when absent.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when the key maps to no object.
    pub fn get_by<T: ObjectKind, K: IndexKey>(&self, index: &str, key: &K) -> DbResult<T> {
        self.find_by::<T, K>(index, key)?
            .ok_or_else(|| DbError::not_found(format!("{} key in '{index}'", T::type_name())))
    }

    /// Runs `f` with shared access to the generic index of kind `T`.
    ///
    /// This is the escape hatch for scans, range queries, and undo-stack
    /// inspection that the owned-copy accessors cannot express.
    pub fn with_index<T: ObjectKind, R>(
        &self,
        f: impl FnOnce(&GenericIndex<T>) -> R,
    ) -> DbResult<R> {
        self.ensure_open()?;
        self.require_read_lock("with_index", T::type_name())?;
        let registry = self.registry.read();
        let guard = registry.typed::<T>()?.read();
        Ok(f(&guard))
    }

    // ========================================================================
    // Sessions and the undo stack
    // ========================================================================

    /// Starts a composite undo session over every registered index.
    ///
    /// With `enabled = false` the returned session is inert. The session
    /// rolls all indices back when dropped unless
    /// [`push`](Session::push)ed, squashed, or undone first.
    pub fn start_undo_session(&self, enabled: bool) -> DbResult<Session> {
        self.ensure_open()?;
        let registry = self.registry.read();
        let sessions: Vec<IndexSession> = registry
            .iter()
            .map(|index: &Arc<dyn AbstractIndex>| IndexSession::new(Arc::clone(index), enabled))
            .collect();
        self.stats.record_session_start();
        Ok(Session::new(
            sessions,
            SessionTicket::new(Arc::clone(&self.undo_session_count)),
        ))
    }

    /// The database revision: the first registered index's revision, or
    /// `-1` when nothing is registered.
    #[must_use]
    pub fn revision(&self) -> i64 {
        self.registry.read().first().map_or(-1, |i| i.revision())
    }

    /// Rolls back the newest undo state of every registered index.
    ///
    /// # Errors
    ///
    /// Propagates [`DbError::StateCorrupt`]; fatal to stack consistency.
    pub fn undo(&self) -> DbResult<()> {
        self.ensure_open()?;
        for index in self.registry.read().iter() {
            index.undo()?;
        }
        self.stats.record_undo();
        Ok(())
    }

    /// Squashes the two newest undo states of every registered index.
    pub fn squash(&self) -> DbResult<()> {
        self.ensure_open()?;
        for index in self.registry.read().iter() {
            index.squash();
        }
        self.stats.record_squash();
        Ok(())
    }

    /// Discards all undo states at or below `revision` on every index,
    /// making their changes unrecoverable.
    pub fn commit(&self, revision: i64) -> DbResult<()> {
        self.ensure_open()?;
        for index in self.registry.read().iter() {
            index.commit(revision);
        }
        self.stats.record_commit();
        Ok(())
    }

    /// Unwinds every undo state on every index.
    ///
    /// # Errors
    ///
    /// Propagates [`DbError::StateCorrupt`].
    pub fn undo_all(&self) -> DbResult<()> {
        self.ensure_open()?;
        for index in self.registry.read().iter() {
            index.undo_all()?;
        }
        Ok(())
    }

    /// Aligns every index with an externally tracked revision.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidState`] when any index still has undo states.
    pub fn set_revision(&self, revision: i64) -> DbResult<()> {
        self.ensure_open()?;
        self.require_write_lock("set_revision", "i64")?;
        for index in self.registry.read().iter() {
            index.set_revision(revision)?;
        }
        Ok(())
    }

    // ========================================================================
    // Locking
    // ========================================================================

    /// Runs `f` under a shared (reader) lock.
    ///
    /// # Errors
    ///
    /// [`DbError::ReadLockTimeout`] once the configured retry budget is
    /// exhausted.
    pub fn with_read_lock<R>(&self, f: impl FnOnce() -> R) -> DbResult<R> {
        let (wait_micro, retries) = {
            let config = self.config.read();
            (config.read_wait_micro, config.max_read_wait_retries)
        };

        let lock = self.lock_manager.current_lock();
        let guard = if wait_micro == 0 || retries == 0 {
            lock.read()
        } else {
            let wait = Duration::from_micros(wait_micro);
            let mut retry = 0u32;
            loop {
                if let Some(guard) = lock.try_read_for(wait) {
                    break guard;
                }
                if retry >= retries {
                    tracing::error!(retries, "no more retries for read lock");
                    return Err(DbError::ReadLockTimeout { retries });
                }
                tracing::warn!(retry, "read lock timeout");
                retry += 1;
            }
        };

        let _hold = HoldGuard::read(&self.lock_state);
        let out = f();
        drop(guard);
        Ok(out)
    }

    /// Runs `f` under an exclusive (writer) lock with an explicit retry
    /// budget.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidState`] on a read-only handle,
    /// [`DbError::WriteLockTimeout`] once the budget is exhausted.
    pub fn with_write_lock<R>(
        &self,
        wait_micro: u64,
        retries: u32,
        f: impl FnOnce() -> R,
    ) -> DbResult<R> {
        let guard = self.acquire_write(wait_micro, retries)?;
        let _hold = HoldGuard::write(&self.lock_state);
        let out = f();
        drop(guard);
        Ok(out)
    }

    /// Runs `f` under the writer lock using the configured retry budget.
    pub fn with_weak_write_lock<R>(&self, f: impl FnOnce() -> R) -> DbResult<R> {
        let (wait_micro, retries) = {
            let config = self.config.read();
            (config.write_wait_micro, config.max_write_wait_retries)
        };
        self.with_write_lock(wait_micro, retries, f)
    }

    /// Runs `f` under the writer lock with fixed large limits.
    ///
    /// When the budget is exhausted and
    /// [`Config::allow_stale_lock_rotation`] is set, the lock ring advances
    /// one slot (abandoning its readers) and the acquisition is retried on
    /// the fresh slot.
    pub fn with_strong_write_lock<R>(&self, f: impl FnOnce() -> R) -> DbResult<R> {
        let guard = match self.acquire_write(STRONG_WRITE_WAIT_MICRO, STRONG_WRITE_RETRIES) {
            Ok(guard) => guard,
            Err(err @ DbError::WriteLockTimeout { .. }) => {
                if !self.config.read().allow_stale_lock_rotation {
                    return Err(err);
                }
                tracing::error!(
                    slot = self.lock_manager.current_slot(),
                    "write lock starved; rotating lock ring, stale readers are abandoned"
                );
                self.lock_manager.next_lock();
                self.acquire_write(STRONG_WRITE_WAIT_MICRO, STRONG_WRITE_RETRIES)?
            }
            Err(err) => return Err(err),
        };
        let _hold = HoldGuard::write(&self.lock_state);
        let out = f();
        drop(guard);
        Ok(out)
    }

    fn acquire_write(
        &self,
        wait_micro: u64,
        retries: u32,
    ) -> DbResult<parking_lot::RwLockWriteGuard<'_, ()>> {
        if self.read_only {
            return Err(DbError::invalid_state(
                "cannot acquire write lock on read-only process",
            ));
        }

        let lock = self.lock_manager.current_lock();
        if wait_micro == 0 || retries == 0 {
            return Ok(lock.write());
        }

        let wait = Duration::from_micros(wait_micro);
        let mut retry = 0u32;
        loop {
            if let Some(guard) = lock.try_write_for(wait) {
                return Ok(guard);
            }
            if retry >= retries {
                tracing::error!(retries, "no more retries for write lock");
                return Err(DbError::WriteLockTimeout { retries });
            }
            tracing::warn!(retry, "write lock timeout");
            retry += 1;
        }
    }

    /// Enables or disables runtime lock-discipline checks.
    pub fn set_require_locking(&self, enable: bool) {
        self.lock_state.set_require_locking(enable);
        self.config.write().require_locking = enable;
    }

    fn require_read_lock(&self, op: &str, type_name: &str) -> DbResult<()> {
        if self.lock_state.require_locking()
            && self.read_only
            && self.lock_state.read_holds() <= 0
        {
            return Err(DbError::lock_discipline(op, type_name, "read"));
        }
        Ok(())
    }

    fn require_write_lock(&self, op: &str, type_name: &str) -> DbResult<()> {
        if self.lock_state.require_locking() && self.lock_state.write_holds() <= 0 {
            return Err(DbError::lock_discipline(op, type_name, "write"));
        }
        Ok(())
    }

    // ========================================================================
    // Tuning knobs
    // ========================================================================

    /// The per-attempt read-lock wait in microseconds.
    #[must_use]
    pub fn read_wait_micro(&self) -> u64 {
        self.config.read().read_wait_micro
    }

    /// Sets the per-attempt read-lock wait in microseconds.
    pub fn set_read_wait_micro(&self, value: u64) {
        self.config.write().read_wait_micro = value;
    }

    /// The read-lock retry budget.
    #[must_use]
    pub fn max_read_wait_retries(&self) -> u32 {
        self.config.read().max_read_wait_retries
    }

    /// Sets the read-lock retry budget.
    pub fn set_max_read_wait_retries(&self, value: u32) {
        self.config.write().max_read_wait_retries = value;
    }

    /// The per-attempt weak write-lock wait in microseconds.
    #[must_use]
    pub fn write_wait_micro(&self) -> u64 {
        self.config.read().write_wait_micro
    }

    /// Sets the per-attempt weak write-lock wait in microseconds.
    pub fn set_write_wait_micro(&self, value: u64) {
        self.config.write().write_wait_micro = value;
    }

    /// The weak write-lock retry budget.
    #[must_use]
    pub fn max_write_wait_retries(&self) -> u32 {
        self.config.read().max_write_wait_retries
    }

    /// Sets the weak write-lock retry budget.
    pub fn set_max_write_wait_retries(&self, value: u32) {
        self.config.write().max_write_wait_retries = value;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Serializes every registered index into the segment and forces an OS
    /// sync. Durability exists only at these boundaries.
    ///
    /// A no-op on a read-only handle.
    pub fn flush(&self) -> DbResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Ok(());
        }

        let registry = self.registry.read();
        let mut segment = self.segment.write();
        for index in registry.iter() {
            let bytes = index.image_bytes()?;
            segment.put_record(index.type_name(), bytes)?;
        }
        segment.flush()?;
        self.stats.record_flush();
        Ok(())
    }

    /// Flushes (write mode) and marks the handle closed. Idempotent.
    pub fn close(&self) -> DbResult<()> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.read_only {
            self.flush()?;
        }
        self.is_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Consumes the handle and deletes the database files.
    pub fn wipe(self) -> DbResult<()> {
        let dir = self.data_dir.clone();
        // suppress the drop-time flush; the files are about to go away
        self.is_open.store(false, Ordering::SeqCst);
        drop(self);
        if let Some(dir) = dir {
            Segment::wipe(&dir)?;
            tracing::info!(dir = %dir.display(), "wiped database");
        }
        Ok(())
    }

    /// Grows the segment file to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidState`] while undo sessions are active,
    /// [`DbError::GrowthRefused`] when the OS refuses.
    pub fn resize(&self, new_size: u64) -> DbResult<()> {
        self.ensure_open()?;
        if self.undo_session_count.load(Ordering::SeqCst) != 0 {
            return Err(DbError::invalid_state(
                "cannot resize shared memory file while undo session is active",
            ));
        }
        self.flush()?;
        self.segment.write().grow(new_size)
    }

    /// Validates every registered index against the running binary.
    ///
    /// # Errors
    ///
    /// [`DbError::BinaryIncompatible`] on the first mismatch.
    pub fn validate(&self) -> DbResult<()> {
        for index in self.registry.read().iter() {
            index.validate()?;
        }
        Ok(())
    }

    /// Bytes of segment capacity not used by the current record table.
    #[must_use]
    pub fn free_capacity(&self) -> u64 {
        self.segment.read().free_capacity()
    }

    /// Takes a snapshot of the operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns true while the handle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// Returns true when the handle was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::invalid_state("database is closed"))
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("read_only", &self.read_only)
            .field("indices", &self.registry.read().len())
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
