//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// The store is one regular file addressed by absolute offsets. The file
/// handle is serialized behind a single mutex, and the size is read from
/// the filesystem on demand rather than cached, so a handle never
/// disagrees with what is actually on disk.
///
/// # Durability
///
/// `sync()` calls `File::sync_all()` to push data and metadata to disk.
///
/// # Read-only handles
///
/// A backend opened through [`FileBackend::open_read_only`] rejects
/// `write_at` and `set_len` with a `PermissionDenied` I/O error instead of
/// surfacing whatever the OS would say about a read-only descriptor.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    writable: bool,
}

impl FileBackend {
    fn open_inner(path: &Path, writable: bool) -> StorageResult<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if writable {
            options.write(true).create(true);
        }
        let file = options.open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            writable,
        })
    }

    /// Opens a writable backend, creating the file if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_inner(path, true)
    }

    /// Opens an existing file without write access.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        Self::open_inner(path, false)
    }

    /// Opens a writable backend, creating any missing parent directories
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or the file
    /// cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
            _ => {}
        }
        Self::open_inner(path, true)
    }

    /// The file this backend reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StorageError::Io(io::Error::new(
                ErrorKind::PermissionDenied,
                "backend was opened read-only",
            )))
        }
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        let size = file.metadata()?.len();

        let end = offset
            .checked_add(len as u64)
            .filter(|&end| end <= size)
            .ok_or(StorageError::ReadPastEnd { offset, len, size })?;
        if offset == end {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.ensure_writable()?;
        if data.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        Ok(())
    }

    fn set_len(&mut self, new_len: u64) -> StorageResult<()> {
        self.ensure_writable()?;

        let file = self.file.lock();
        file.set_len(new_len)
            .map_err(|e| StorageError::ResizeFailed {
                requested: new_len,
                message: e.to_string(),
            })
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}
