//! # relmatch
//!
//! A relational-style query layer over an in-process, tuple-keyed store.
//!
//! Applications describe queries declaratively — filter expression trees
//! with bound parameters, projections, orderings, limits, update
//! specifications — and relmatch compiles them to the store's native
//! selection predicate (pattern + guards + projection), emulating the
//! relational semantics the store lacks (multi-key ordering, limits, bulk
//! update/delete) by whole-result-set post-processing. All mutations run
//! inside atomic transactions, with durable, monotonic primary-key
//! allocation per table.
//!
//! ## Quick start
//!
//! ```no_run
//! use relmatch_core::query::{Direction, FilterExpr, Operand, QueryContext};
//! use relmatch_core::store::Store;
//! use relmatch_core::types::{Datum, StorageMedium, TableDef, TableKind};
//! use relmatch_core::update::UpdateOp;
//! use relmatch_core::rec;
//!
//! let store = Store::open("data")?;
//! store.register_table(TableDef::new(
//!     "users",
//!     TableKind::OrderedSet,
//!     ["id", "name", "age"],
//!     StorageMedium::Disc,
//! ))?;
//!
//! // Auto-assigned primary key.
//! store.insert("users", rec!["alice", 30])?;
//!
//! // Build a context once, re-bind it per execution.
//! let ctx = QueryContext::new("users", ["id", "name", "age"])
//!     .filter(FilterExpr::ge("age", Operand::param(0)))
//!     .order_by("age", Direction::Desc)
//!     .limit(10)
//!     .build()?;
//! let (count, rows) = store.select_all("users", &ctx.bind(&[Datum::Int(18)])?)?;
//!
//! // Bulk update inside one atomic transaction.
//! store.update_all("users", &ctx.bind(&[Datum::Int(21)])?, &[UpdateOp::incr("age", 1)], false)?;
//! # Ok::<(), relmatch_core::error::Error>(())
//! ```

pub mod error;
pub mod query;
pub mod seq;
pub mod store;
pub mod table;
pub mod txn;
pub mod types;
pub mod update;

pub use error::{Error, Result};
pub use query::{BoundQuery, CmpOp, Direction, FilterExpr, Operand, QueryContext};
pub use store::Store;
pub use table::TableData;
pub use txn::Txn;
pub use types::{Datum, Record, StorageMedium, TableDef, TableKind};
pub use update::{UpdateAction, UpdateOp};
