//! Core types: tagged values, records, table definitions.
//!
//! The store is type-agnostic: any value may sit in any tuple position, so
//! records are fixed-arity sequences of a tagged [`Datum`] variant, never
//! statically-typed structs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single tagged value stored in a tuple position.
///
/// `Datum` carries a total order across all variants so that any two values
/// compare deterministically: booleans sort first, then numbers (with `Int`
/// and `Float` compared numerically against each other), then strings,
/// byte strings, and lists. `Eq` and `Hash` are consistent with that order,
/// so `Int(1)` and `Float(1.0)` address the same key in every table kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<Datum>),
}

impl Datum {
    /// Rank used for cross-variant ordering. `Int` and `Float` share a rank
    /// because they compare numerically.
    fn type_rank(&self) -> u8 {
        match self {
            Datum::Bool(_) => 0,
            Datum::Int(_) | Datum::Float(_) => 1,
            Datum::Str(_) => 2,
            Datum::Bytes(_) => 3,
            Datum::List(_) => 4,
        }
    }

    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Str(_) => "string",
            Datum::Int(_) => "integer",
            Datum::Float(_) => "float",
            Datum::Bool(_) => "boolean",
            Datum::Bytes(_) => "binary",
            Datum::List(_) => "list",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Datum::Int(_) | Datum::Float(_))
    }
}

/// Compare an integer against a float without converting the integer to
/// `f64` first (which silently loses precision above 2^53).
///
/// NaN sorts greater than every integer, matching `f64::total_cmp`'s
/// placement of positive NaN at the top.
fn cmp_int_float(a: i64, b: f64) -> Ordering {
    if b.is_nan() {
        return Ordering::Less;
    }
    // 2^63 is exactly representable; every i64 is strictly below it.
    if b >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    if b < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    let floor = b.floor() as i64;
    match a.cmp(&floor) {
        Ordering::Equal if b.fract() == 0.0 => Ordering::Equal,
        // a == floor(b) but b has a fractional part, so a < b.
        Ordering::Equal => Ordering::Less,
        other => other,
    }
}

/// Compare two floats: normal IEEE order, except -0.0 == 0.0 and all NaNs
/// are equal to each other and greater than every other float.
fn cmp_floats(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None => a.is_nan().cmp(&b.is_nan()),
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::Float(a), Datum::Float(b)) => cmp_floats(*a, *b),
            (Datum::Int(a), Datum::Float(b)) => cmp_int_float(*a, *b),
            (Datum::Float(a), Datum::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Datum::Str(a), Datum::Str(b)) => a.cmp(b),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.cmp(b),
            (Datum::List(a), Datum::List(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.type_rank());
        match self {
            Datum::Bool(b) => b.hash(state),
            Datum::Int(i) => i.hash(state),
            Datum::Float(f) => {
                // Integral floats must hash like the equal Int; -0.0 like 0.
                if f.fract() == 0.0
                    && *f >= -9_223_372_036_854_775_808.0
                    && *f < 9_223_372_036_854_775_808.0
                {
                    (*f as i64).hash(state);
                } else if f.is_nan() {
                    state.write_u8(0xfe);
                } else {
                    state.write_u8(0xff);
                    f.to_bits().hash(state);
                }
            }
            Datum::Str(s) => s.hash(state),
            Datum::Bytes(b) => b.hash(state),
            Datum::List(l) => l.hash(state),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Str(s) => write!(f, "{s:?}"),
            Datum::Int(i) => write!(f, "{i}"),
            Datum::Float(x) => write!(f, "{x}"),
            Datum::Bool(b) => write!(f, "{b}"),
            Datum::Bytes(b) => write!(f, "<<{} bytes>>", b.len()),
            Datum::List(l) => {
                write!(f, "[")?;
                for (i, d) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(v as i64)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Str(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Str(v)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Datum::Bytes(v)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(v: Vec<Datum>) -> Self {
        Datum::List(v)
    }
}

/// Build a [`Record`] from a comma-separated list of values convertible
/// into [`Datum`]. The first value is the primary key.
///
/// ```
/// use relmatch_core::rec;
/// let row = rec![1, "alice", true];
/// assert_eq!(row.arity(), 3);
/// ```
#[macro_export]
macro_rules! rec {
    ($($v:expr),* $(,)?) => {
        $crate::types::Record::from(vec![$($crate::types::Datum::from($v)),*])
    };
}

/// An ordered tuple whose first element is the primary-key value and whose
/// remaining elements are column values in table-definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(pub Vec<Datum>);

impl Record {
    /// The primary-key value (tuple position 0).
    pub fn key(&self) -> &Datum {
        &self.0[0]
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, pos: usize) -> Option<&Datum> {
        self.0.get(pos)
    }
}

impl From<Vec<Datum>> for Record {
    fn from(values: Vec<Datum>) -> Self {
        Record(values)
    }
}

impl std::ops::Index<usize> for Record {
    type Output = Datum;

    fn index(&self, pos: usize) -> &Datum {
        &self.0[pos]
    }
}

/// Per-table policy on whether the leading tuple field must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Unordered, primary key unique.
    Set,
    /// Key order, primary key unique.
    OrderedSet,
    /// No uniqueness; the leading field may repeat.
    Bag,
}

/// Where a table's rows live between process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMedium {
    /// In-memory only; rows are lost when the store closes.
    Memory,
    /// Snapshotted to the data directory at every commit that touches it.
    Disc,
}

/// Schema definition for a table. Immutable after registration; created by
/// the (external) migration collaborator and consumed here as a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub kind: TableKind,
    /// Column names in tuple order. `columns[0]` names the primary key.
    pub columns: Vec<String>,
    pub medium: StorageMedium,
}

impl TableDef {
    pub fn new(
        name: impl Into<String>,
        kind: TableKind,
        columns: impl IntoIterator<Item = impl Into<String>>,
        medium: StorageMedium,
    ) -> Self {
        TableDef {
            name: name.into(),
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
            medium,
        }
    }

    /// Tuple arity: one position per column, key included.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Resolve a column name to its tuple position.
    pub fn position_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}
