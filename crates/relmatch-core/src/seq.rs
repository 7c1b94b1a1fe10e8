//! Sequence allocator: durable, per-table monotonic integer keys.
//!
//! Counters live in the reserved `"@sequence"` disc table as ordinary
//! 2-column records `(table_name, next)`, so an allocation participates in
//! the allocating transaction's overlay: it commits with the insert it
//! serves and rolls back with it. Committed values are never reused; gaps
//! from aborted transactions are acceptable.

use crate::table::TableData;
use crate::types::{Datum, Record, StorageMedium, TableDef, TableKind};

/// Name of the reserved, always-present counter table.
pub const SEQUENCE_TABLE: &str = "@sequence";

/// Definition of the counter table: `(table_name, next)`, key-unique,
/// persisted.
pub fn sequence_table_def() -> TableDef {
    TableDef::new(
        SEQUENCE_TABLE,
        TableKind::OrderedSet,
        ["table", "next"],
        StorageMedium::Disc,
    )
}

/// Allocate the next key for `table` against the given counter-table data
/// (normally a transaction's overlay copy of `"@sequence"`).
///
/// The counter record stores the next value to hand out. On first use for
/// an unseen table the counter initializes from `observed_max` (the
/// table's current largest integer key, for migration friendliness),
/// returning `observed_max + 1`.
pub fn allocate(seq: &mut TableData, table: &str, observed_max: Option<i64>) -> i64 {
    let key = Datum::Str(table.to_string());

    let next = seq
        .get(&key)
        .first()
        .and_then(|row| match row.get(1) {
            Some(Datum::Int(n)) => Some(*n),
            _ => None,
        })
        .unwrap_or_else(|| observed_max.unwrap_or(0) + 1);

    seq.replace(Record(vec![key, Datum::Int(next + 1)]));
    next
}
