//! Error types for all relmatch operations.

use std::io;
use thiserror::Error;

/// Top-level error type for relmatch operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Insert(#[from] InsertError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Delete(#[from] DeleteError),

    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A key-addressed mutation was given a filter that does not fix the
    /// primary key. Raised before the store is touched.
    #[error("filter on table '{table}' does not bind the primary key")]
    MissingPrimaryKey { table: String },
}

/// A filter, ordering, projection, or update specification referenced an
/// unknown or unrepresentable construct. Never retried.
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("parameter ${index} out of range ({provided} bound)")]
    ParamOutOfRange { index: usize, provided: usize },

    #[error("expression depth exceeds maximum of {max}")]
    DepthExceeded { max: usize },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists with a different definition: {0}")]
    TableExists(String),

    #[error("table names beginning with '@' are reserved: {0}")]
    ReservedName(String),

    #[error("table '{0}' must declare at least its key column")]
    NoColumns(String),

    #[error("record arity mismatch on table '{table}': expected {expected} (or {} without a key), got {actual}", expected - 1)]
    ArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("primary key {key} already exists in table '{table}'")]
    AlreadyExists { table: String, key: String },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("no record with key {key} in table '{table}'")]
    NotFound { table: String, key: String },

    #[error("{action} is not applicable to column '{column}' holding {found}")]
    KindMismatch {
        column: String,
        action: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("no record with key {key} in table '{table}'")]
    NotFound { table: String, key: String },
}

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupted snapshot: {0}")]
    Corrupted(String),

    #[error("data directory is locked by another process")]
    DirLocked,
}

pub type Result<T> = std::result::Result<T, Error>;
