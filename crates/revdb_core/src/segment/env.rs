//! Environment sentinel.

use serde::{Deserialize, Serialize};

/// Length of the null-padded compiler identification field.
pub const COMPILER_FIELD_LEN: usize = 256;

/// Identifies the toolchain and platform a segment was created with.
///
/// Stored under a fixed record name inside the segment. On reopen the
/// stored sentinel must equal the running process's sentinel byte for byte;
/// any difference means the heap image cannot be trusted by this binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCheck {
    compiler_version: Vec<u8>,
    debug: bool,
    apple: bool,
    windows: bool,
}

impl EnvironmentCheck {
    /// Returns the sentinel of the running process.
    ///
    /// The compiler string is captured at build time from `rustc --version`
    /// and null-padded to [`COMPILER_FIELD_LEN`] bytes.
    #[must_use]
    pub fn current() -> Self {
        let mut compiler_version = vec![0u8; COMPILER_FIELD_LEN];
        let version = env!("REVDB_RUSTC_VERSION").as_bytes();
        let len = version.len().min(COMPILER_FIELD_LEN);
        compiler_version[..len].copy_from_slice(&version[..len]);

        Self {
            compiler_version,
            debug: cfg!(debug_assertions),
            apple: cfg!(target_os = "macos"),
            windows: cfg!(windows),
        }
    }

    /// Returns the compiler identification with padding stripped.
    #[must_use]
    pub fn compiler(&self) -> String {
        let end = self
            .compiler_version
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.compiler_version.len());
        String::from_utf8_lossy(&self.compiler_version[..end]).into_owned()
    }
}
