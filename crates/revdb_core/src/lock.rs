//! Reader-writer lock manager and lock-discipline bookkeeping.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

/// Number of slots in the lock ring.
pub(crate) const NUM_RW_LOCKS: usize = 10;

/// A fixed ring of reader-writer mutexes with an atomic cursor.
///
/// Normal operation uses only the current slot. Advancing the cursor is the
/// last-resort escape valve for a writer starved by dead readers: the old
/// slot is abandoned with its readers still inside, and all new lock
/// traffic moves to the next slot. Readers left on an abandoned slot keep a
/// valid guard (no undefined behavior), but the data they read may change
/// under them once the writer proceeds.
pub struct LockManager {
    locks: [RwLock<()>; NUM_RW_LOCKS],
    current: AtomicUsize,
}

impl LockManager {
    /// Creates a manager with all slots unlocked, cursor at slot zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| RwLock::new(())),
            current: AtomicUsize::new(0),
        }
    }

    /// Returns the lock at the current cursor position.
    #[must_use]
    pub fn current_lock(&self) -> &RwLock<()> {
        &self.locks[self.current.load(Ordering::Acquire) % NUM_RW_LOCKS]
    }

    /// Returns the cursor position.
    #[must_use]
    pub fn current_slot(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Advances the cursor to the next slot and returns its lock.
    pub fn next_lock(&self) -> &RwLock<()> {
        let slot = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        &self.locks[slot % NUM_RW_LOCKS]
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime lock-discipline state: hold counters and the opt-in flag.
///
/// The counters track how many `with_read_lock` / `with_write_lock` scopes
/// are live on this database; record operations consult them when checks
/// are enabled.
pub(crate) struct LockState {
    read_holds: AtomicI32,
    write_holds: AtomicI32,
    require_locking: AtomicBool,
}

impl LockState {
    pub(crate) fn new(require_locking: bool) -> Self {
        Self {
            read_holds: AtomicI32::new(0),
            write_holds: AtomicI32::new(0),
            require_locking: AtomicBool::new(require_locking),
        }
    }

    pub(crate) fn require_locking(&self) -> bool {
        self.require_locking.load(Ordering::Acquire)
    }

    pub(crate) fn set_require_locking(&self, enable: bool) {
        self.require_locking.store(enable, Ordering::Release);
    }

    pub(crate) fn read_holds(&self) -> i32 {
        self.read_holds.load(Ordering::Acquire)
    }

    pub(crate) fn write_holds(&self) -> i32 {
        self.write_holds.load(Ordering::Acquire)
    }
}

/// Increments a hold counter for its lifetime.
pub(crate) struct HoldGuard<'a> {
    counter: &'a AtomicI32,
}

impl<'a> HoldGuard<'a> {
    pub(crate) fn read(state: &'a LockState) -> Self {
        Self::on(&state.read_holds)
    }

    pub(crate) fn write(state: &'a LockState) -> Self {
        Self::on(&state.write_holds)
    }

    fn on(counter: &'a AtomicI32) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
