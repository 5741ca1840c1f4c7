//! Error types for revdb core.

use revdb_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in revdb operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A key was not present in the queried index.
    #[error("not found: {key}")]
    NotFound {
        /// Description of the missing key.
        key: String,
    },

    /// An insert or modify was rejected by a uniqueness constraint.
    #[error("uniqueness violation on index '{index}' of {type_name}")]
    UniquenessViolation {
        /// The object kind whose index rejected the mutation.
        type_name: String,
        /// Name of the rejecting index.
        index: String,
    },

    /// Undo could not restore a prior state.
    ///
    /// This should be unreachable while the undo invariants hold and must be
    /// treated as fatal to the transactional consistency of the stack.
    #[error("undo state corrupt: {message}")]
    StateCorrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The stored footprint does not match the running binary.
    #[error("content of segment does not match data expected by this executable for {type_name}")]
    BinaryIncompatible {
        /// The object kind whose footprint mismatched.
        type_name: String,
    },

    /// The environment sentinel did not match on reopen.
    #[error("database created by a different compiler, build, or operating system")]
    EnvironmentMismatch,

    /// The OS refused to grow the segment file.
    #[error("could not grow database file to {requested} bytes")]
    GrowthRefused {
        /// The requested size in bytes.
        requested: u64,
    },

    /// The writer file lock is held by another process.
    #[error("could not gain write access to the shared memory file at {path}")]
    AlreadyLocked {
        /// Path of the contended lock file.
        path: String,
    },

    /// The read-lock retry budget was exhausted.
    #[error("unable to acquire read lock after {retries} retries")]
    ReadLockTimeout {
        /// Number of retries that were attempted.
        retries: u32,
    },

    /// The write-lock retry budget was exhausted.
    #[error("unable to acquire write lock after {retries} retries")]
    WriteLockTimeout {
        /// Number of retries that were attempted.
        retries: u32,
    },

    /// A record operation ran without the lock it requires.
    ///
    /// Raised only when runtime locking checks are enabled via
    /// [`crate::Database::set_require_locking`].
    #[error("{op} on {type_name} requires a held {lock} lock")]
    LockDisciplineViolation {
        /// The operation that was attempted.
        op: String,
        /// The object kind being accessed.
        type_name: String,
        /// Which lock was missing ("read" or "write").
        lock: &'static str,
    },

    /// A second index was registered under an occupied type id.
    #[error("type_id {type_id} is already in use ({type_name})")]
    DuplicateRegistration {
        /// The object kind that attempted registration.
        type_name: String,
        /// The contested registry key.
        type_id: u16,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Segment image encode/decode error.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DbError {
    /// Creates a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a uniqueness-violation error.
    pub fn uniqueness_violation(type_name: impl Into<String>, index: impl Into<String>) -> Self {
        Self::UniquenessViolation {
            type_name: type_name.into(),
            index: index.into(),
        }
    }

    /// Creates a state-corrupt error.
    pub fn state_corrupt(message: impl Into<String>) -> Self {
        Self::StateCorrupt {
            message: message.into(),
        }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a binary-incompatible error.
    pub fn binary_incompatible(type_name: impl Into<String>) -> Self {
        Self::BinaryIncompatible {
            type_name: type_name.into(),
        }
    }

    /// Creates a duplicate-registration error.
    pub fn duplicate_registration(type_name: impl Into<String>, type_id: u16) -> Self {
        Self::DuplicateRegistration {
            type_name: type_name.into(),
            type_id,
        }
    }

    /// Creates a lock-discipline-violation error.
    pub fn lock_discipline(
        op: impl Into<String>,
        type_name: impl Into<String>,
        lock: &'static str,
    ) -> Self {
        Self::LockDisciplineViolation {
            op: op.into(),
            type_name: type_name.into(),
            lock,
        }
    }

    /// Creates a codec error from any displayable cause.
    pub fn codec(cause: impl std::fmt::Display) -> Self {
        Self::Codec {
            message: cause.to_string(),
        }
    }
}
