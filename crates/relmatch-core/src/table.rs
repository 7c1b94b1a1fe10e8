//! Table engine: raw CRUD primitives over a tuple-keyed table, one storage
//! shape per key-uniqueness variant.

use std::collections::{BTreeMap, HashMap};

use crate::types::{Datum, Record, TableDef, TableKind};

/// A registered table: its immutable definition plus current row storage.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub def: TableDef,
    pub data: TableData,
}

/// In-memory row storage for one table.
///
/// `Set` iterates in undefined (hash) order, `OrderedSet` in key order,
/// `Bag` in key order with insertion order within a key. Uniqueness is
/// enforced on [`TableData::insert`] for the two unique variants and holds
/// at every committed snapshot.
#[derive(Debug, Clone)]
pub enum TableData {
    Set(HashMap<Datum, Record>),
    OrderedSet(BTreeMap<Datum, Record>),
    Bag(BTreeMap<Datum, Vec<Record>>),
}

impl TableData {
    pub fn new(kind: TableKind) -> Self {
        match kind {
            TableKind::Set => TableData::Set(HashMap::new()),
            TableKind::OrderedSet => TableData::OrderedSet(BTreeMap::new()),
            TableKind::Bag => TableData::Bag(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            TableData::Set(_) => TableKind::Set,
            TableData::OrderedSet(_) => TableKind::OrderedSet,
            TableData::Bag(_) => TableKind::Bag,
        }
    }

    /// Number of rows (not distinct keys).
    pub fn len(&self) -> usize {
        match self {
            TableData::Set(m) => m.len(),
            TableData::OrderedSet(m) => m.len(),
            TableData::Bag(m) => m.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows stored under a key: zero or one for the unique variants,
    /// any number for bags.
    pub fn get(&self, key: &Datum) -> Vec<&Record> {
        match self {
            TableData::Set(m) => m.get(key).into_iter().collect(),
            TableData::OrderedSet(m) => m.get(key).into_iter().collect(),
            TableData::Bag(m) => m.get(key).map(|rows| rows.iter().collect()).unwrap_or_default(),
        }
    }

    pub fn contains_key(&self, key: &Datum) -> bool {
        match self {
            TableData::Set(m) => m.contains_key(key),
            TableData::OrderedSet(m) => m.contains_key(key),
            TableData::Bag(m) => m.contains_key(key),
        }
    }

    /// Insert a row, enforcing the table's uniqueness variant.
    ///
    /// Returns `false` (leaving the table untouched) on a key collision in
    /// a unique variant; bags always accept.
    #[must_use]
    pub fn insert(&mut self, row: Record) -> bool {
        let key = row.key().clone();
        match self {
            TableData::Set(m) => {
                if m.contains_key(&key) {
                    return false;
                }
                m.insert(key, row);
            }
            TableData::OrderedSet(m) => {
                if m.contains_key(&key) {
                    return false;
                }
                m.insert(key, row);
            }
            TableData::Bag(m) => m.entry(key).or_default().push(row),
        }
        true
    }

    /// Insert or overwrite without a uniqueness check. Bags append.
    pub fn replace(&mut self, row: Record) {
        let key = row.key().clone();
        match self {
            TableData::Set(m) => {
                m.insert(key, row);
            }
            TableData::OrderedSet(m) => {
                m.insert(key, row);
            }
            TableData::Bag(m) => m.entry(key).or_default().push(row),
        }
    }

    /// Remove and return every row stored under a key.
    pub fn remove(&mut self, key: &Datum) -> Vec<Record> {
        match self {
            TableData::Set(m) => m.remove(key).into_iter().collect(),
            TableData::OrderedSet(m) => m.remove(key).into_iter().collect(),
            TableData::Bag(m) => m.remove(key).unwrap_or_default(),
        }
    }

    /// Remove one specific row (first equal match under its key).
    /// Returns whether a row was removed.
    pub fn remove_row(&mut self, row: &Record) -> bool {
        match self {
            TableData::Set(m) => {
                if m.get(row.key()) == Some(row) {
                    m.remove(row.key());
                    return true;
                }
                false
            }
            TableData::OrderedSet(m) => {
                if m.get(row.key()) == Some(row) {
                    m.remove(row.key());
                    return true;
                }
                false
            }
            TableData::Bag(m) => {
                let Some(rows) = m.get_mut(row.key()) else {
                    return false;
                };
                let Some(idx) = rows.iter().position(|r| r == row) else {
                    return false;
                };
                rows.remove(idx);
                if rows.is_empty() {
                    m.remove(row.key());
                }
                true
            }
        }
    }

    /// Iterate all rows in the table's native order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            TableData::Set(m) => Box::new(m.values()),
            TableData::OrderedSet(m) => Box::new(m.values()),
            TableData::Bag(m) => Box::new(m.values().flatten()),
        }
    }

    /// Largest integer key currently present, for sequence-counter
    /// initialization on pre-populated tables.
    pub fn max_int_key(&self) -> Option<i64> {
        let keys: Box<dyn Iterator<Item = &Datum>> = match self {
            TableData::Set(m) => Box::new(m.keys()),
            TableData::OrderedSet(m) => Box::new(m.keys()),
            TableData::Bag(m) => Box::new(m.keys()),
        };
        keys.filter_map(|k| match k {
            Datum::Int(i) => Some(*i),
            _ => None,
        })
        .max()
    }
}
