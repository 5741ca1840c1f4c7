//! Database statistics and telemetry.
//!
//! All counters are atomic and can be read while operations are in
//! progress.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for one database handle.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    creates: AtomicU64,
    modifies: AtomicU64,
    removes: AtomicU64,
    reads: AtomicU64,
    sessions_started: AtomicU64,
    undos: AtomicU64,
    squashes: AtomicU64,
    commits: AtomicU64,
    flushes: AtomicU64,
}

impl DatabaseStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_modify(&self) {
        self.modifies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_start(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_undo(&self) {
        self.undos.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_squash(&self) {
        self.squashes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            modifies: self.modifies.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            undos: self.undos.load(Ordering::Relaxed),
            squashes: self.squashes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Objects created.
    pub creates: u64,
    /// Objects modified.
    pub modifies: u64,
    /// Objects removed.
    pub removes: u64,
    /// Point reads served.
    pub reads: u64,
    /// Undo sessions started.
    pub sessions_started: u64,
    /// Broadcast undos performed.
    pub undos: u64,
    /// Broadcast squashes performed.
    pub squashes: u64,
    /// Broadcast commits performed.
    pub commits: u64,
    /// Flushes performed.
    pub flushes: u64,
}
