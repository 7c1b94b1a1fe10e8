//! The store handle: committed state, transaction execution, durability.
//!
//! `Store` is cheaply clonable (`Arc`-based) and `Send + Sync`. Writes
//! follow a single-writer model: one write transaction at a time, serialized
//! by `writer_lock`, with the committed state swapped in under a brief write
//! lock so readers never observe a partially-applied transaction.

pub mod file;
pub mod lock;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Result, SchemaError};
use crate::query::context::BoundQuery;
use crate::seq;
use crate::table::{TableData, TableEntry};
use crate::txn::Txn;
use crate::types::{Datum, Record, StorageMedium, TableDef};
use crate::update::UpdateOp;

use lock::DirLock;

struct StoreState {
    tables: HashMap<String, TableEntry>,
    txn_counter: u64,
}

struct StoreInner {
    state: RwLock<StoreState>,
    /// Serializes write transactions (single-writer model).
    writer_lock: Mutex<()>,
    dir: PathBuf,
    _dir_lock: DirLock,
}

/// The main store handle.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open (or create) a store rooted at the given data directory.
    ///
    /// Acquires an exclusive directory lock, loads every persisted table
    /// snapshot, and ensures the reserved sequence-counter table exists.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(crate::error::StorageError::from)?;
        let dir_lock = DirLock::try_exclusive(&dir.join("store.lock"))?;

        let mut tables = HashMap::new();
        for (def, data) in file::load_all(dir)? {
            tables.insert(def.name.clone(), TableEntry { def, data });
        }

        if !tables.contains_key(seq::SEQUENCE_TABLE) {
            let def = seq::sequence_table_def();
            let data = TableData::new(def.kind);
            file::stage_snapshot(dir, &def, Vec::new())?.publish()?;
            tables.insert(def.name.clone(), TableEntry { def, data });
        }

        info!(dir = %dir.display(), tables = tables.len(), "store opened");
        Ok(Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    tables,
                    txn_counter: 0,
                }),
                writer_lock: Mutex::new(()),
                dir: dir.to_path_buf(),
                _dir_lock: dir_lock,
            }),
        })
    }

    /// Register an already-created table definition (the interface
    /// boundary with the external schema/DDL collaborator).
    ///
    /// Re-registering an identical definition is a no-op; a conflicting
    /// one is rejected. The store never creates or alters definitions on
    /// its own.
    pub fn register_table(&self, def: TableDef) -> Result<()> {
        if def.name.starts_with('@') {
            return Err(SchemaError::ReservedName(def.name).into());
        }
        if def.columns.is_empty() {
            return Err(SchemaError::NoColumns(def.name).into());
        }

        let _writer = self.inner.writer_lock.lock();
        let mut state = self.inner.state.write();
        if let Some(existing) = state.tables.get(&def.name) {
            if existing.def == def {
                return Ok(());
            }
            return Err(SchemaError::TableExists(def.name).into());
        }

        if def.medium == StorageMedium::Disc {
            file::stage_snapshot(&self.inner.dir, &def, Vec::new())?.publish()?;
        }
        debug!(table = %def.name, kind = ?def.kind, "table registered");
        let data = TableData::new(def.kind);
        state.tables.insert(def.name.clone(), TableEntry { def, data });
        Ok(())
    }

    /// The registered definition of a table.
    pub fn table_def(&self, name: &str) -> Result<TableDef> {
        let state = self.inner.state.read();
        state
            .tables
            .get(name)
            .map(|e| e.def.clone())
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()).into())
    }

    /// Names of every registered table, the reserved ones included.
    pub fn table_names(&self) -> Vec<String> {
        let state = self.inner.state.read();
        let mut names: Vec<String> = state.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Execute a unit of work as one atomic transaction.
    ///
    /// The closure receives a writable [`Txn`]. If it returns `Ok`, every
    /// effect (table writes and sequence-counter advances alike) commits
    /// together: dirty disc tables are snapshotted, then the overlay is
    /// swapped into the committed state. If it returns `Err`, the overlay
    /// is dropped and the store is exactly as before the transaction began.
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Txn<'_>) -> Result<T>,
    {
        // One write transaction at a time.
        let _writer = self.inner.writer_lock.lock();

        let state = self.inner.state.read();
        let txn_id = state.txn_counter + 1;
        let mut txn = Txn::new(&state.tables, txn_id);

        match f(&mut txn) {
            Ok(value) => {
                let overlay = txn.into_overlay();

                // Stage snapshots for every dirty disc table before
                // publishing any of them, so a failed write aborts the
                // whole commit with nothing renamed into place.
                let mut staged = Vec::new();
                for (name, data) in &overlay {
                    let def = &state.tables[name.as_str()].def;
                    if def.medium == StorageMedium::Disc {
                        let rows: Vec<Record> = data.iter().cloned().collect();
                        match file::stage_snapshot(&self.inner.dir, def, rows) {
                            Ok(s) => staged.push(s),
                            Err(e) => {
                                for s in staged {
                                    s.discard();
                                }
                                return Err(e.into());
                            }
                        }
                    }
                }
                let touched = overlay.len();
                drop(state);

                for s in staged {
                    s.publish()?;
                }

                let mut state = self.inner.state.write();
                for (name, data) in overlay {
                    state
                        .tables
                        .get_mut(&name)
                        .expect("overlay only holds registered tables")
                        .data = data;
                }
                state.txn_counter = txn_id;
                debug!(txn_id, tables = touched, "transaction committed");
                Ok(value)
            }
            Err(e) => {
                debug!(txn_id, error = %e, "transaction aborted");
                Err(e)
            }
        }
    }

    /// Execute a read-only unit of work against a consistent snapshot of
    /// the committed state. Does not block (and is not blocked by) the
    /// body of a concurrent write transaction — only its brief commit swap.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Txn<'_>) -> Result<T>,
    {
        let state = self.inner.state.read();
        let txn = Txn::new(&state.tables, state.txn_counter);
        f(&txn)
    }

    // -----------------------------------------------------------------------
    // Single-operation surface (each call is its own transaction unless
    // composed into `run` by the caller)
    // -----------------------------------------------------------------------

    pub fn select(&self, table: &str, query: &BoundQuery) -> Result<Vec<Record>> {
        self.read(|txn| txn.select(table, query))
    }

    pub fn select_all(&self, table: &str, query: &BoundQuery) -> Result<(usize, Vec<Record>)> {
        self.read(|txn| txn.select_all(table, query))
    }

    pub fn insert(&self, table: &str, record: Record) -> Result<Record> {
        self.run(move |txn| txn.insert(table, record))
    }

    pub fn update(&self, table: &str, key: &Datum, ops: &[UpdateOp]) -> Result<Record> {
        self.run(|txn| txn.update(table, key, ops))
    }

    pub fn delete(&self, table: &str, key: &Datum) -> Result<Datum> {
        self.run(|txn| txn.delete(table, key))
    }

    pub fn update_by(&self, table: &str, query: &BoundQuery, ops: &[UpdateOp]) -> Result<Record> {
        self.run(|txn| txn.update_by(table, query, ops))
    }

    pub fn delete_by(&self, table: &str, query: &BoundQuery) -> Result<Datum> {
        self.run(|txn| txn.delete_by(table, query))
    }

    pub fn update_all(
        &self,
        table: &str,
        query: &BoundQuery,
        ops: &[UpdateOp],
        returning: bool,
    ) -> Result<(usize, Option<Vec<Record>>)> {
        self.run(|txn| txn.update_all(table, query, ops, returning))
    }

    pub fn delete_all(
        &self,
        table: &str,
        query: &BoundQuery,
        returning: bool,
    ) -> Result<(usize, Option<Vec<Record>>)> {
        self.run(|txn| txn.delete_all(table, query, returning))
    }

    pub fn next_id(&self, table: &str) -> Result<i64> {
        self.run(|txn| txn.next_id(table))
    }
}
