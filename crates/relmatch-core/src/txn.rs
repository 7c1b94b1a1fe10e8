//! Transactions: a unit of work over table-level copy-on-write overlays.
//!
//! A [`Txn`] reads through its overlay (a transaction sees its own prior
//! writes) and falls back to the committed tables beneath. Nothing outside
//! the transaction observes the overlay until [`crate::store::Store::run`]
//! commits it wholesale; on error the overlay is simply dropped, so every
//! bulk operation (select → mutate → collect) is all-or-nothing.

use std::collections::HashMap;

use crate::error::{
    DeleteError, Error, InsertError, Result, SchemaError, UpdateError,
};
use crate::query::compile::{MatchPredicate, compile};
use crate::query::context::BoundQuery;
use crate::query::order::{apply_limit, sort_rows};
use crate::seq;
use crate::table::{TableData, TableEntry};
use crate::types::{Datum, Record, TableDef};
use crate::update::{UpdateOp, apply_update};

/// A transaction over the store's committed tables.
///
/// Obtained from [`crate::store::Store::run`] (writable) or
/// [`crate::store::Store::read`] (the overlay simply stays empty).
pub struct Txn<'a> {
    tables: &'a HashMap<String, TableEntry>,
    overlay: HashMap<String, TableData>,
    txn_id: u64,
}

impl<'a> Txn<'a> {
    pub(crate) fn new(tables: &'a HashMap<String, TableEntry>, txn_id: u64) -> Self {
        Txn {
            tables,
            overlay: HashMap::new(),
            txn_id,
        }
    }

    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    pub(crate) fn into_overlay(self) -> HashMap<String, TableData> {
        self.overlay
    }

    fn entry(&self, table: &str) -> Result<&TableEntry> {
        self.tables
            .get(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()).into())
    }

    /// The table's definition.
    pub fn def(&self, table: &str) -> Result<&TableDef> {
        Ok(&self.entry(table)?.def)
    }

    /// Current row storage: the overlay copy if this transaction has
    /// written to the table, the committed data otherwise.
    fn data(&self, table: &str) -> Result<&TableData> {
        if let Some(data) = self.overlay.get(table) {
            return Ok(data);
        }
        Ok(&self.entry(table)?.data)
    }

    /// Writable row storage; copies the committed table into the overlay
    /// on first write.
    fn data_mut(&mut self, table: &str) -> Result<&mut TableData> {
        if !self.overlay.contains_key(table) {
            let data = self.entry(table)?.data.clone();
            self.overlay.insert(table.to_string(), data);
        }
        Ok(self.overlay.get_mut(table).expect("just inserted"))
    }

    /// Compile the query and materialize every matching row (unprojected,
    /// in selection order). Probes by key when the pattern fixes one.
    fn matching_rows(&self, table: &str, query: &BoundQuery) -> Result<(MatchPredicate, Vec<Record>)> {
        let arity = self.entry(table)?.def.arity();
        if query.arity != arity {
            return Err(SchemaError::ArityMismatch {
                table: table.to_string(),
                expected: arity,
                actual: query.arity,
            }
            .into());
        }

        let predicate = compile(query)?;
        let data = self.data(table)?;
        let rows = match predicate.key_equality() {
            Some(key) => data
                .get(key)
                .into_iter()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect(),
            None => data
                .iter()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect(),
        };
        Ok((predicate, rows))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Every record matching the predicate, projected, in selection order.
    pub fn select(&self, table: &str, query: &BoundQuery) -> Result<Vec<Record>> {
        let (predicate, rows) = self.matching_rows(table, query)?;
        Ok(rows.iter().map(|r| predicate.project(r)).collect())
    }

    /// Matching records with ordering and limit applied; the count equals
    /// the number of rows returned.
    ///
    /// Ordering runs over the full selected set before the limit — the
    /// native scan order says nothing about the requested order, so
    /// pre-limiting would return the wrong N rows.
    pub fn select_all(&self, table: &str, query: &BoundQuery) -> Result<(usize, Vec<Record>)> {
        let (predicate, mut rows) = self.matching_rows(table, query)?;
        sort_rows(&mut rows, query.order());
        apply_limit(&mut rows, query.limit());
        let out: Vec<Record> = rows.iter().map(|r| predicate.project(r)).collect();
        Ok((out.len(), out))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a record.
    ///
    /// A record with one value fewer than the table's arity gets a
    /// generated primary key prepended (allocated inside this transaction,
    /// so an abort rolls the counter advance back too). Returns the record
    /// as stored.
    pub fn insert(&mut self, table: &str, record: Record) -> Result<Record> {
        let arity = self.def(table)?.arity();

        let record = if record.arity() == arity {
            record
        } else if record.arity() + 1 == arity {
            let id = self.next_id(table)?;
            let mut values = Vec::with_capacity(arity);
            values.push(Datum::Int(id));
            values.extend(record.0);
            Record(values)
        } else {
            return Err(SchemaError::ArityMismatch {
                table: table.to_string(),
                expected: arity,
                actual: record.arity(),
            }
            .into());
        };

        let data = self.data_mut(table)?;
        if !data.insert(record.clone()) {
            return Err(InsertError::AlreadyExists {
                table: table.to_string(),
                key: record.key().to_string(),
            }
            .into());
        }
        Ok(record)
    }

    /// Replace the record(s) stored under `key` by applying an update
    /// specification. Returns the (first) replacement record.
    pub fn update(&mut self, table: &str, key: &Datum, ops: &[UpdateOp]) -> Result<Record> {
        let def = self.def(table)?.clone();
        let targets: Vec<Record> = self
            .data(table)?
            .get(key)
            .into_iter()
            .cloned()
            .collect();
        if targets.is_empty() {
            return Err(UpdateError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            }
            .into());
        }

        let mut replacements = self.apply_row_updates(table, &def, &targets, ops)?;
        Ok(replacements.remove(0))
    }

    /// Delete every record stored under `key`; returns the key.
    pub fn delete(&mut self, table: &str, key: &Datum) -> Result<Datum> {
        self.def(table)?;
        let removed = self.data_mut(table)?.remove(key);
        if removed.is_empty() {
            return Err(DeleteError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        Ok(key.clone())
    }

    /// Single-row update addressed by a filter tree. The compiled pattern
    /// must fix the primary key; fails fast with `MissingPrimaryKey`
    /// before touching the store otherwise.
    pub fn update_by(
        &mut self,
        table: &str,
        query: &BoundQuery,
        ops: &[UpdateOp],
    ) -> Result<Record> {
        let def = self.def(table)?.clone();
        let (predicate, targets) = self.key_addressed_rows(table, query)?;
        if targets.is_empty() {
            let key = predicate.key_equality().expect("checked by key_addressed_rows");
            return Err(UpdateError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        let mut replacements = self.apply_row_updates(table, &def, &targets, ops)?;
        Ok(replacements.remove(0))
    }

    /// Single-row delete addressed by a filter tree; same key requirement
    /// as [`Txn::update_by`].
    pub fn delete_by(&mut self, table: &str, query: &BoundQuery) -> Result<Datum> {
        let (predicate, targets) = self.key_addressed_rows(table, query)?;
        let key = predicate
            .key_equality()
            .expect("checked by key_addressed_rows")
            .clone();
        if targets.is_empty() {
            return Err(DeleteError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        let data = self.data_mut(table)?;
        for row in &targets {
            data.remove_row(row);
        }
        Ok(key)
    }

    /// Update every matching record (ordering and limit bound which rows,
    /// in which order). Returns the count and, when `returning`, the
    /// projected replacement rows.
    pub fn update_all(
        &mut self,
        table: &str,
        query: &BoundQuery,
        ops: &[UpdateOp],
        returning: bool,
    ) -> Result<(usize, Option<Vec<Record>>)> {
        let def = self.def(table)?.clone();
        let (predicate, mut rows) = self.matching_rows(table, query)?;
        sort_rows(&mut rows, query.order());
        apply_limit(&mut rows, query.limit());

        let replacements = self.apply_row_updates(table, &def, &rows, ops)?;
        let count = replacements.len();
        let returned =
            returning.then(|| replacements.iter().map(|r| predicate.project(r)).collect());
        Ok((count, returned))
    }

    /// Delete every matching record. Returns the count and, when
    /// `returning`, the projected deleted rows.
    pub fn delete_all(
        &mut self,
        table: &str,
        query: &BoundQuery,
        returning: bool,
    ) -> Result<(usize, Option<Vec<Record>>)> {
        let (predicate, mut rows) = self.matching_rows(table, query)?;
        sort_rows(&mut rows, query.order());
        apply_limit(&mut rows, query.limit());

        let data = self.data_mut(table)?;
        for row in &rows {
            data.remove_row(row);
        }
        let count = rows.len();
        let returned = returning.then(|| rows.iter().map(|r| predicate.project(r)).collect());
        Ok((count, returned))
    }

    /// Allocate the next generated primary key for a table.
    ///
    /// The counter advance lives in this transaction's overlay of the
    /// reserved counter table: it commits (durably) with the transaction
    /// and rolls back with it. Committed values are never reused.
    pub fn next_id(&mut self, table: &str) -> Result<i64> {
        self.def(table)?;

        // The observed maximum only matters for a counter seen for the
        // first time; skip the scan otherwise.
        let counter_key = Datum::Str(table.to_string());
        let uninitialized = self.data(seq::SEQUENCE_TABLE)?.get(&counter_key).is_empty();
        let observed_max = if uninitialized {
            self.data(table)?.max_int_key()
        } else {
            None
        };

        let counters = self.data_mut(seq::SEQUENCE_TABLE)?;
        Ok(seq::allocate(counters, table, observed_max))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Matching rows for a key-addressed mutation: the compiled pattern
    /// must fix the primary key.
    fn key_addressed_rows(
        &self,
        table: &str,
        query: &BoundQuery,
    ) -> Result<(MatchPredicate, Vec<Record>)> {
        let (predicate, rows) = self.matching_rows(table, query)?;
        if predicate.key_equality().is_none() {
            return Err(Error::MissingPrimaryKey {
                table: table.to_string(),
            });
        }
        Ok((predicate, rows))
    }

    /// Replace `targets` with their updated forms. Replacements are
    /// computed (and kind-checked) before any row is touched; key-changing
    /// replacements are re-checked against the table's uniqueness rules.
    fn apply_row_updates(
        &mut self,
        table: &str,
        def: &TableDef,
        targets: &[Record],
        ops: &[UpdateOp],
    ) -> Result<Vec<Record>> {
        let replacements: Vec<Record> = targets
            .iter()
            .map(|row| apply_update(row, ops, def))
            .collect::<Result<_>>()?;

        let data = self.data_mut(table)?;

        // Reject a key change that collides with a row outside the target
        // set before mutating anything.
        for (original, replacement) in targets.iter().zip(&replacements) {
            if replacement.key() != original.key() {
                let colliding = data
                    .get(replacement.key())
                    .into_iter()
                    .any(|existing| !targets.contains(existing));
                if colliding && data.kind() != crate::types::TableKind::Bag {
                    return Err(InsertError::AlreadyExists {
                        table: table.to_string(),
                        key: replacement.key().to_string(),
                    }
                    .into());
                }
            }
        }

        for target in targets {
            data.remove_row(target);
        }
        for replacement in &replacements {
            if !data.insert(replacement.clone()) {
                // Two replacements collapsing onto one key.
                return Err(InsertError::AlreadyExists {
                    table: table.to_string(),
                    key: replacement.key().to_string(),
                }
                .into());
            }
        }
        Ok(replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::context::{Direction, QueryContext};
    use crate::query::filter::{FilterExpr, Operand};
    use crate::rec;
    use crate::types::{StorageMedium, TableKind};

    fn base_with(defs: &[TableDef]) -> HashMap<String, TableEntry> {
        let mut tables = HashMap::new();
        let seq_def = seq::sequence_table_def();
        tables.insert(
            seq_def.name.clone(),
            TableEntry {
                data: TableData::new(seq_def.kind),
                def: seq_def,
            },
        );
        for def in defs {
            tables.insert(
                def.name.clone(),
                TableEntry {
                    def: def.clone(),
                    data: TableData::new(def.kind),
                },
            );
        }
        tables
    }

    fn users_def() -> TableDef {
        TableDef::new(
            "users",
            TableKind::OrderedSet,
            ["id", "name", "age"],
            StorageMedium::Memory,
        )
    }

    fn match_all(def: &TableDef) -> BoundQuery {
        QueryContext::for_table(def).build().unwrap().bind(&[]).unwrap()
    }

    #[test]
    fn test_insert_and_select_all_rows() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);

        txn.insert("users", rec![1, "alice", 30]).unwrap();
        txn.insert("users", rec![2, "bob", 25]).unwrap();

        // Match-all select returns every record; count equals cardinality.
        let (count, rows) = txn.select_all("users", &match_all(&users_def())).unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_insert_duplicate_key_fails_and_keeps_first() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);

        txn.insert("users", rec![1, "alice", 30]).unwrap();
        let err = txn.insert("users", rec![1, "impostor", 99]).unwrap_err();
        assert!(matches!(
            err,
            Error::Insert(InsertError::AlreadyExists { .. })
        ));

        let rows = txn.select("users", &match_all(&users_def())).unwrap();
        assert_eq!(rows, vec![rec![1, "alice", 30]]);
    }

    #[test]
    fn test_insert_without_key_allocates_sequence() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);

        let stored = txn.insert("users", rec!["alice", 30]).unwrap();
        assert_eq!(stored.key(), &Datum::Int(1));
        let stored = txn.insert("users", rec!["bob", 25]).unwrap();
        assert_eq!(stored.key(), &Datum::Int(2));
    }

    #[test]
    fn test_insert_wrong_arity_rejected() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        let err = txn.insert("users", rec![1]).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::ArityMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_sequence_initializes_from_observed_max() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![41, "legacy", 1]).unwrap();
        assert_eq!(txn.next_id("users").unwrap(), 42);
        assert_eq!(txn.next_id("users").unwrap(), 43);
    }

    #[test]
    fn test_reads_see_own_writes() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();

        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::eq("id", 1))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        assert_eq!(txn.select("users", &q).unwrap().len(), 1);
    }

    #[test]
    fn test_update_round_trip() {
        let def = TableDef::new(
            "pairs",
            TableKind::Set,
            ["id", "value"],
            StorageMedium::Memory,
        );
        let base = base_with(&[def.clone()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("pairs", rec![1, 10]).unwrap();

        let spec = [UpdateOp::set("value", 5)];
        let updated = txn.update("pairs", &Datum::Int(1), &spec).unwrap();
        assert_eq!(updated, rec![1, 5]);

        // Re-applying the same spec is idempotent.
        let updated = txn.update("pairs", &Datum::Int(1), &spec).unwrap();
        assert_eq!(updated, rec![1, 5]);
    }

    #[test]
    fn test_update_missing_key_fails() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        let err = txn
            .update("users", &Datum::Int(9), &[UpdateOp::set("age", 1)])
            .unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::NotFound { .. })));
    }

    #[test]
    fn test_update_changing_key_rechecks_uniqueness() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();
        txn.insert("users", rec![2, "bob", 25]).unwrap();

        let err = txn
            .update("users", &Datum::Int(1), &[UpdateOp::set("id", 2)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Insert(InsertError::AlreadyExists { .. })
        ));

        // Moving to a free key works.
        let moved = txn
            .update("users", &Datum::Int(1), &[UpdateOp::set("id", 7)])
            .unwrap();
        assert_eq!(moved.key(), &Datum::Int(7));
        assert!(txn.delete("users", &Datum::Int(1)).is_err());
    }

    #[test]
    fn test_delete_returns_key() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();

        assert_eq!(txn.delete("users", &Datum::Int(1)).unwrap(), Datum::Int(1));
        let err = txn.delete("users", &Datum::Int(1)).unwrap_err();
        assert!(matches!(err, Error::Delete(DeleteError::NotFound { .. })));
    }

    #[test]
    fn test_update_by_requires_key_equality() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();

        // Filter fixes only a non-key column.
        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::eq("name", "alice"))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        let err = txn
            .update_by("users", &q, &[UpdateOp::set("age", 31)])
            .unwrap_err();
        assert!(matches!(err, Error::MissingPrimaryKey { .. }));

        // With the key fixed, the extra constraint still applies.
        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::and(vec![
                FilterExpr::eq("id", 1),
                FilterExpr::gt("age", 28),
            ]))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        let updated = txn
            .update_by("users", &q, &[UpdateOp::set("age", 31)])
            .unwrap();
        assert_eq!(updated, rec![1, "alice", 31]);
    }

    #[test]
    fn test_delete_by_respects_full_predicate() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();

        // Key matches, guard does not: nothing to delete.
        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::and(vec![
                FilterExpr::eq("id", 1),
                FilterExpr::lt("age", 10),
            ]))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        assert!(txn.delete_by("users", &q).is_err());

        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::eq("id", 1))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        assert_eq!(txn.delete_by("users", &q).unwrap(), Datum::Int(1));
    }

    #[test]
    fn test_select_all_orders_then_limits() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![3, "b", 1]).unwrap();
        txn.insert("users", rec![1, "a", 1]).unwrap();
        txn.insert("users", rec![2, "a", 1]).unwrap();

        let ctx = QueryContext::for_table(&users_def())
            .order_by("name", Direction::Asc)
            .order_by("id", Direction::Asc)
            .build()
            .unwrap();

        let (count, rows) = txn.select_all("users", &ctx.bind(&[]).unwrap()).unwrap();
        assert_eq!(count, 3);
        assert_eq!(rows, vec![rec![1, "a", 1], rec![2, "a", 1], rec![3, "b", 1]]);

        let ctx = QueryContext::for_table(&users_def())
            .order_by("name", Direction::Asc)
            .order_by("id", Direction::Asc)
            .limit(2)
            .build()
            .unwrap();
        let (count, rows) = txn.select_all("users", &ctx.bind(&[]).unwrap()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows, vec![rec![1, "a", 1], rec![2, "a", 1]]);
    }

    #[test]
    fn test_update_all_with_params_and_returning() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();
        txn.insert("users", rec![2, "bob", 17]).unwrap();
        txn.insert("users", rec![3, "carol", 45]).unwrap();

        let ctx = QueryContext::for_table(&users_def())
            .filter(FilterExpr::ge("age", Operand::param(0)))
            .build()
            .unwrap();
        let q = ctx.bind(&[Datum::Int(18)]).unwrap();

        let (count, rows) = txn
            .update_all("users", &q, &[UpdateOp::incr("age", 1)], true)
            .unwrap();
        assert_eq!(count, 2);
        let rows = rows.unwrap();
        assert!(rows.contains(&rec![1, "alice", 31]));
        assert!(rows.contains(&rec![3, "carol", 46]));

        // returning = false yields no rows.
        let q = ctx.bind(&[Datum::Int(0)]).unwrap();
        let (count, rows) = txn
            .update_all("users", &q, &[UpdateOp::incr("age", 0)], false)
            .unwrap();
        assert_eq!(count, 3);
        assert!(rows.is_none());
    }

    #[test]
    fn test_delete_all_with_residual_or_filter() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();
        txn.insert("users", rec![2, "bob", 17]).unwrap();
        txn.insert("users", rec![3, "carol", 45]).unwrap();

        // Disjunction: compiled through the residual fallback path.
        let q = QueryContext::for_table(&users_def())
            .filter(FilterExpr::or(vec![
                FilterExpr::lt("age", 20),
                FilterExpr::gt("age", 40),
            ]))
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();

        let (count, rows) = txn.delete_all("users", &q, true).unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows.unwrap().len(), 2);

        let remaining = txn.select("users", &match_all(&users_def())).unwrap();
        assert_eq!(remaining, vec![rec![1, "alice", 30]]);
    }

    #[test]
    fn test_delete_all_with_limit_deletes_only_first_n() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "a", 1]).unwrap();
        txn.insert("users", rec![2, "b", 2]).unwrap();
        txn.insert("users", rec![3, "c", 3]).unwrap();

        let q = QueryContext::for_table(&users_def())
            .order_by("id", Direction::Desc)
            .limit(2)
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        let (count, rows) = txn.delete_all("users", &q, true).unwrap();
        assert_eq!(count, 2);
        assert_eq!(rows.unwrap(), vec![rec![3, "c", 3], rec![2, "b", 2]]);

        let remaining = txn.select("users", &match_all(&users_def())).unwrap();
        assert_eq!(remaining, vec![rec![1, "a", 1]]);
    }

    #[test]
    fn test_bag_key_addressed_update_hits_every_row() {
        let def = TableDef::new(
            "events",
            TableKind::Bag,
            ["id", "status"],
            StorageMedium::Memory,
        );
        let base = base_with(&[def.clone()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("events", rec![1, "new"]).unwrap();
        txn.insert("events", rec![1, "new"]).unwrap();
        txn.insert("events", rec![2, "new"]).unwrap();

        txn.update("events", &Datum::Int(1), &[UpdateOp::set("status", "seen")])
            .unwrap();
        let q = match_all(&def);
        let rows = txn.select("events", &q).unwrap();
        assert_eq!(
            rows.iter().filter(|r| r[1] == Datum::Str("seen".into())).count(),
            2
        );
    }

    #[test]
    fn test_projection_keeps_rows_addressable() {
        let base = base_with(&[users_def()]);
        let mut txn = Txn::new(&base, 1);
        txn.insert("users", rec![1, "alice", 30]).unwrap();

        let q = QueryContext::for_table(&users_def())
            .project(["age"])
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        let rows = txn.select("users", &q).unwrap();
        // Key first, then the projected column.
        assert_eq!(rows, vec![rec![1, 30]]);
    }

    #[test]
    fn test_unknown_table_fails() {
        let base = base_with(&[]);
        let mut txn = Txn::new(&base, 1);
        let err = txn.insert("ghosts", rec![1]).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::TableNotFound(_))));
    }

    #[test]
    fn test_query_arity_mismatch_detected() {
        let base = base_with(&[users_def()]);
        let txn = Txn::new(&base, 1);
        // A context built against a different schema.
        let q = QueryContext::new("users", ["id", "name"])
            .build()
            .unwrap()
            .bind(&[])
            .unwrap();
        let err = txn.select("users", &q).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::ArityMismatch { .. })));
    }
}
