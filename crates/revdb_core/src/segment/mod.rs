//! Segment: the persistent named-record heap.
//!
//! The segment plays the role of a memory-mapped heap image: every
//! registered index serializes its full state (objects, undo stack,
//! `next_id`, revision, footprints) into one named record, and the segment
//! persists the record table as a single image file. Durability exists only
//! at [`Segment::flush`] boundaries.
//!
//! On-disk layout inside the database directory:
//!
//! ```text
//! <dir>/
//! ├─ shared_memory.bin    # heap image: length prefix + record table
//! └─ shared_memory.meta   # fixed-size sidecar; write-lock target
//! ```

mod env;

pub use env::{EnvironmentCheck, COMPILER_FIELD_LEN};

use crate::config::OpenMode;
use crate::error::{DbError, DbResult};
use crate::lock::NUM_RW_LOCKS;
use fs2::FileExt;
use revdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File name of the heap image.
pub const DATA_FILE: &str = "shared_memory.bin";
/// File name of the meta sidecar.
pub const META_FILE: &str = "shared_memory.meta";
/// Record name of the environment sentinel.
pub const ENVIRONMENT_RECORD: &str = "environment";

const MAGIC: [u8; 8] = *b"REVDBSEG";
const FORMAT_VERSION: u32 = 1;

/// Size of the meta sidecar: two mirrors of the lock-manager ring
/// (one slot cursor plus one word per slot, each 8 bytes).
const META_SIZE: u64 = 2 * 8 * (NUM_RW_LOCKS as u64 + 1);

#[derive(Serialize)]
struct SegmentImageRef<'a> {
    magic: [u8; 8],
    format_version: u32,
    records: &'a BTreeMap<String, Vec<u8>>,
}

#[derive(Deserialize)]
struct SegmentImage {
    magic: [u8; 8],
    format_version: u32,
    records: BTreeMap<String, Vec<u8>>,
}

/// The meta sidecar: lock-manager mirror and advisory-lock target.
#[derive(Debug)]
struct MetaSidecar {
    file: File,
    path: PathBuf,
    locked: bool,
}

impl Drop for MetaSidecar {
    fn drop(&mut self) {
        if self.locked {
            let _ = fs2::FileExt::unlock(&self.file);
        }
    }
}

/// A named-record heap persisted as a single image file.
///
/// Records are opaque byte strings keyed by name. The database stores one
/// [`EnvironmentCheck`] sentinel plus one record per registered index,
/// keyed by the kind's type name.
pub struct Segment {
    backend: Box<dyn StorageBackend>,
    meta: Option<MetaSidecar>,
    records: BTreeMap<String, Vec<u8>>,
    capacity: u64,
    read_only: bool,
}

impl Segment {
    /// Opens or creates the segment files inside `dir`.
    ///
    /// - An existing image is mapped according to `mode`; in write mode it
    ///   is grown when `requested_size` exceeds the current file size.
    /// - A missing image is created with `requested_size` bytes (write mode
    ///   only).
    /// - The stored environment sentinel must match the running process.
    /// - In write mode an advisory lock is taken on the meta sidecar.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] when opening a missing database read-only,
    /// [`DbError::GrowthRefused`] when the OS refuses the requested size,
    /// [`DbError::EnvironmentMismatch`] on a sentinel mismatch, and
    /// [`DbError::AlreadyLocked`] when another writer holds the lock.
    pub fn open_dir(dir: &Path, mode: OpenMode, requested_size: u64) -> DbResult<Self> {
        let write = mode == OpenMode::ReadWrite;

        if !dir.exists() && !write {
            return Err(DbError::not_found(format!(
                "database file not found at {}",
                dir.display()
            )));
        }
        if write {
            fs::create_dir_all(dir)?;
        }

        let data_path = dir.join(DATA_FILE);
        let (backend, records, capacity) = if data_path.exists() {
            Self::attach_existing(&data_path, write, requested_size)?
        } else {
            if !write {
                return Err(DbError::not_found(format!(
                    "database file not found at {}",
                    data_path.display()
                )));
            }
            Self::create_new(&data_path, requested_size)?
        };

        let meta = Self::open_meta(dir, write)?;

        Ok(Self {
            backend,
            meta,
            records,
            capacity,
            read_only: !write,
        })
    }

    /// Creates an ephemeral in-memory segment. Always writable.
    #[must_use]
    pub fn in_memory() -> Self {
        let mut records = BTreeMap::new();
        records.insert(
            ENVIRONMENT_RECORD.to_string(),
            encode(&EnvironmentCheck::current()),
        );
        Self {
            backend: Box::new(InMemoryBackend::new()),
            meta: None,
            records,
            capacity: 0,
            read_only: false,
        }
    }

    fn attach_existing(
        data_path: &Path,
        write: bool,
        requested_size: u64,
    ) -> DbResult<(Box<dyn StorageBackend>, BTreeMap<String, Vec<u8>>, u64)> {
        let mut backend: Box<dyn StorageBackend> = if write {
            Box::new(FileBackend::open(data_path)?)
        } else {
            Box::new(FileBackend::open_read_only(data_path)?)
        };

        let file_len = backend.len()?;
        let mut capacity = file_len;
        if write && requested_size > file_len {
            backend
                .set_len(requested_size)
                .map_err(|_| DbError::GrowthRefused {
                    requested: requested_size,
                })?;
            capacity = requested_size;
            tracing::info!(
                from = file_len,
                to = requested_size,
                "grew database file to requested size"
            );
        }

        let records = read_image(backend.as_ref())?;
        let stored: EnvironmentCheck = records
            .get(ENVIRONMENT_RECORD)
            .ok_or(DbError::EnvironmentMismatch)
            .and_then(|bytes| bincode::deserialize(bytes).map_err(|_| DbError::EnvironmentMismatch))?;
        if stored != EnvironmentCheck::current() {
            tracing::error!(
                stored = %stored.compiler(),
                running = %EnvironmentCheck::current().compiler(),
                "environment sentinel mismatch"
            );
            return Err(DbError::EnvironmentMismatch);
        }

        Ok((backend, records, capacity))
    }

    fn create_new(
        data_path: &Path,
        requested_size: u64,
    ) -> DbResult<(Box<dyn StorageBackend>, BTreeMap<String, Vec<u8>>, u64)> {
        let mut backend: Box<dyn StorageBackend> = Box::new(FileBackend::open(data_path)?);
        backend
            .set_len(requested_size)
            .map_err(|_| DbError::GrowthRefused {
                requested: requested_size,
            })?;

        let mut records = BTreeMap::new();
        records.insert(
            ENVIRONMENT_RECORD.to_string(),
            encode(&EnvironmentCheck::current()),
        );

        // Write the image immediately so the file is valid even if the
        // process dies before the first flush.
        write_image(backend.as_mut(), &records)?;
        backend.sync()?;

        Ok((backend, records, requested_size))
    }

    fn open_meta(dir: &Path, write: bool) -> DbResult<Option<MetaSidecar>> {
        let path = dir.join(META_FILE);
        if !write && !path.exists() {
            return Ok(None);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(write)
            .create(write)
            .truncate(false)
            .open(&path)?;
        if write && file.metadata()?.len() < META_SIZE {
            file.set_len(META_SIZE)?;
        }

        let locked = if write {
            if file.try_lock_exclusive().is_err() {
                return Err(DbError::AlreadyLocked {
                    path: path.display().to_string(),
                });
            }
            true
        } else {
            false
        };

        Ok(Some(MetaSidecar { file, path, locked }))
    }

    /// Looks up a named record.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&[u8]> {
        self.records.get(name).map(Vec::as_slice)
    }

    /// Inserts or replaces a named record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidState`] on a read-only segment.
    pub fn put_record(&mut self, name: &str, bytes: Vec<u8>) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::invalid_state(
                "cannot write through a read-only database handle",
            ));
        }
        self.records.insert(name.to_string(), bytes);
        Ok(())
    }

    /// Writes the image and forces an OS sync of both files.
    ///
    /// A no-op on a read-only segment.
    pub fn flush(&mut self) -> DbResult<()> {
        if self.read_only {
            return Ok(());
        }
        write_image(self.backend.as_mut(), &self.records)?;
        self.backend.sync()?;
        if let Some(meta) = &self.meta {
            meta.file.sync_all()?;
        }
        Ok(())
    }

    /// Grows the image file to `new_capacity` bytes.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidState`] on a read-only segment,
    /// [`DbError::GrowthRefused`] when the OS refuses.
    pub fn grow(&mut self, new_capacity: u64) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::invalid_state("cannot grow a read-only database"));
        }
        if new_capacity <= self.capacity {
            return Ok(());
        }
        self.backend
            .set_len(new_capacity)
            .map_err(|_| DbError::GrowthRefused {
                requested: new_capacity,
            })?;
        tracing::info!(from = self.capacity, to = new_capacity, "grew database file");
        self.capacity = new_capacity;
        Ok(())
    }

    /// The allocated size of the image file in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes of allocated capacity not used by the current record table.
    #[must_use]
    pub fn free_capacity(&self) -> u64 {
        let used = bincode::serialized_size(&SegmentImageRef {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            records: &self.records,
        })
        .map(|n| n + 8)
        .unwrap_or(0);
        self.capacity.saturating_sub(used)
    }

    /// Returns true when the segment was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the path of the meta sidecar, if file-backed.
    #[must_use]
    pub fn meta_path(&self) -> Option<&Path> {
        self.meta.as_ref().map(|m| m.path.as_path())
    }

    /// Deletes the segment files of a database directory.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors other than the files already being absent.
    pub fn wipe(dir: &Path) -> DbResult<()> {
        for name in [DATA_FILE, META_FILE] {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    // the sentinel and image headers are infallible to encode
    bincode::serialize(value).unwrap_or_default()
}

fn read_image(backend: &dyn StorageBackend) -> DbResult<BTreeMap<String, Vec<u8>>> {
    let header = backend.read_at(0, 8)?;
    let payload_len = u64::from_le_bytes(
        header
            .as_slice()
            .try_into()
            .map_err(|_| DbError::codec("short image header"))?,
    );
    let payload = backend.read_at(8, payload_len as usize)?;

    let image: SegmentImage = bincode::deserialize(&payload).map_err(DbError::codec)?;
    if image.magic != MAGIC {
        return Err(DbError::codec("bad segment magic"));
    }
    if image.format_version != FORMAT_VERSION {
        return Err(DbError::invalid_state(format!(
            "unsupported segment format v{}",
            image.format_version
        )));
    }
    Ok(image.records)
}

fn write_image(
    backend: &mut dyn StorageBackend,
    records: &BTreeMap<String, Vec<u8>>,
) -> DbResult<()> {
    let payload = bincode::serialize(&SegmentImageRef {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        records,
    })
    .map_err(DbError::codec)?;

    backend.write_at(0, &(payload.len() as u64).to_le_bytes())?;
    backend.write_at(8, &payload)?;
    Ok(())
}
