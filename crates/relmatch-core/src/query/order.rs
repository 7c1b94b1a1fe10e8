//! Relational `order by` / `limit` emulation.
//!
//! The native predicate language expresses no multi-field ordering beyond a
//! table's own key order, so ordering is a whole-result-set stable sort
//! applied after selection, and limiting strictly follows ordering
//! (pre-limiting an unordered scan would return the wrong N rows).

use std::cmp::Ordering;

use crate::query::context::Direction;
use crate::types::Record;

/// Stable sort by the given (position, direction) keys, first key primary.
/// An empty spec leaves the input (selection order) untouched.
pub fn sort_rows(rows: &mut [Record], spec: &[(usize, Direction)]) {
    if spec.is_empty() {
        return;
    }
    // `sort_by` is stable: ties keep selection order.
    rows.sort_by(|a, b| {
        for &(pos, direction) in spec {
            let ord = a[pos].cmp(&b[pos]);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Truncate to at most `n` rows. `None` returns the input unchanged.
pub fn apply_limit(rows: &mut Vec<Record>, limit: Option<usize>) {
    if let Some(n) = limit {
        rows.truncate(n);
    }
}
