//! Database configuration.

/// How to map the segment files at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Attach to an existing database without write access.
    ReadOnly,
    /// Open or create the database with write access.
    ReadWrite,
}

/// Tuning knobs for a database handle.
#[derive(Debug, Clone)]
pub struct Config {
    /// Wait per read-lock attempt, in microseconds. Zero blocks forever.
    pub read_wait_micro: u64,

    /// Retries after the first failed read-lock attempt.
    pub max_read_wait_retries: u32,

    /// Wait per weak write-lock attempt, in microseconds. Zero blocks forever.
    pub write_wait_micro: u64,

    /// Retries after the first failed weak write-lock attempt.
    pub max_write_wait_retries: u32,

    /// Enables runtime lock-discipline checks on record operations.
    pub require_locking: bool,

    /// Permits the strong write path to rotate the lock ring after its
    /// retry budget is exhausted. Readers left on the abandoned slot may
    /// observe data changing under them; off by default.
    pub allow_stale_lock_rotation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_wait_micro: 1_000_000,
            max_read_wait_retries: 5,
            write_wait_micro: 1_000_000,
            max_write_wait_retries: 10_000,
            require_locking: false,
            allow_stale_lock_rotation: false,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt read-lock wait in microseconds.
    #[must_use]
    pub const fn read_wait_micro(mut self, value: u64) -> Self {
        self.read_wait_micro = value;
        self
    }

    /// Sets the read-lock retry budget.
    #[must_use]
    pub const fn max_read_wait_retries(mut self, value: u32) -> Self {
        self.max_read_wait_retries = value;
        self
    }

    /// Sets the per-attempt weak write-lock wait in microseconds.
    #[must_use]
    pub const fn write_wait_micro(mut self, value: u64) -> Self {
        self.write_wait_micro = value;
        self
    }

    /// Sets the weak write-lock retry budget.
    #[must_use]
    pub const fn max_write_wait_retries(mut self, value: u32) -> Self {
        self.max_write_wait_retries = value;
        self
    }

    /// Enables runtime lock-discipline checks.
    #[must_use]
    pub const fn require_locking(mut self, value: bool) -> Self {
        self.require_locking = value;
        self
    }

    /// Permits lock-ring rotation on strong write-lock starvation.
    #[must_use]
    pub const fn allow_stale_lock_rotation(mut self, value: bool) -> Self {
        self.allow_stale_lock_rotation = value;
        self
    }
}
