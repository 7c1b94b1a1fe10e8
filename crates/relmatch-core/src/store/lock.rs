//! Advisory locking for the data directory.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::StorageError;

/// A file-based lock using advisory locking (`flock(2)` on Unix).
///
/// Held for the lifetime of an open store so two processes cannot mutate
/// the same data directory. Released automatically on drop.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
}

impl DirLock {
    /// Try to acquire the exclusive lock without blocking.
    /// Returns `Err(StorageError::DirLocked)` if another holder exists.
    pub fn try_exclusive(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|_| StorageError::DirLocked)?;

        Ok(Self { _file: file })
    }
}
