//! Durable table snapshots.
//!
//! Each disc table persists as `<dir>/<table>.tbl`: a MessagePack-encoded
//! [`TableSnapshot`] followed by an 8-byte little-endian xxhash64 trailer
//! over the payload. Writes go to a temp file first and are published by
//! rename, so a reader never sees a half-written snapshot; verification on
//! load surfaces torn or tampered files as `StorageError::Corrupted`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::error::StorageError;
use crate::table::TableData;
use crate::types::{Record, TableDef};

/// Seed for the snapshot trailer hash.
const CHECKSUM_SEED: u64 = 0;

/// File extension for table snapshots.
pub const SNAPSHOT_EXT: &str = "tbl";

/// The on-disk form of one table: its definition plus every row.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub def: TableDef,
    pub rows: Vec<Record>,
}

/// Path of a table's snapshot file.
pub fn snapshot_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.{SNAPSHOT_EXT}"))
}

/// A snapshot staged to a temp file, not yet visible under its final name.
pub struct StagedSnapshot {
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl StagedSnapshot {
    /// Publish the staged file under its final name (atomic rename).
    pub fn publish(self) -> Result<(), StorageError> {
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(())
    }

    /// Discard the staged file.
    pub fn discard(self) {
        let _ = fs::remove_file(&self.tmp_path);
    }
}

/// Serialize a snapshot to `<dir>/<table>.tbl.tmp`, fsynced but not yet
/// published. Staging everything before publishing anything keeps a failed
/// multi-table commit from leaving a partial set of new snapshots behind.
pub fn stage_snapshot(
    dir: &Path,
    def: &TableDef,
    rows: Vec<Record>,
) -> Result<StagedSnapshot, StorageError> {
    let snapshot = TableSnapshot {
        def: def.clone(),
        rows,
    };
    let payload = rmp_serde::to_vec(&snapshot)
        .map_err(|e| StorageError::Corrupted(format!("failed to serialize snapshot: {e}")))?;
    let checksum = xxh64(&payload, CHECKSUM_SEED);

    let final_path = snapshot_path(dir, &def.name);
    let tmp_path = final_path.with_extension(format!("{SNAPSHOT_EXT}.tmp"));

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&payload)?;
    file.write_all(&checksum.to_le_bytes())?;
    file.sync_all()?;

    tracing::trace!(table = %def.name, bytes = payload.len(), "staged table snapshot");
    Ok(StagedSnapshot {
        tmp_path,
        final_path,
    })
}

/// Read and verify one snapshot file.
pub fn read_snapshot(path: &Path) -> Result<TableSnapshot, StorageError> {
    let bytes = fs::read(path)?;
    if bytes.len() < 8 {
        return Err(StorageError::Corrupted(format!(
            "snapshot {} is shorter than its checksum trailer",
            path.display()
        )));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - 8);
    let stored = u64::from_le_bytes(trailer.try_into().expect("trailer is 8 bytes"));
    let actual = xxh64(payload, CHECKSUM_SEED);
    if stored != actual {
        return Err(StorageError::Corrupted(format!(
            "snapshot {} checksum mismatch: stored={stored:#018x}, actual={actual:#018x}",
            path.display()
        )));
    }

    rmp_serde::from_slice(payload)
        .map_err(|e| StorageError::Corrupted(format!("failed to decode snapshot: {e}")))
}

/// Load every `*.tbl` snapshot in the directory, rebuilding row storage.
pub fn load_all(dir: &Path) -> Result<Vec<(TableDef, TableData)>, StorageError> {
    let mut loaded = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
            continue;
        }
        let snapshot = read_snapshot(&path)?;
        let mut data = TableData::new(snapshot.def.kind);
        for row in snapshot.rows {
            // Rows were unique at snapshot time; no re-check needed.
            data.replace(row);
        }
        loaded.push((snapshot.def, data));
    }
    // Directory iteration order is platform-dependent.
    loaded.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    Ok(loaded)
}
