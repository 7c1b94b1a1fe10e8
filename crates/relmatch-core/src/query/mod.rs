//! Query pipeline: expression trees, context building, predicate
//! compilation, and ordering/limit emulation.

pub mod compile;
pub mod context;
pub mod filter;
pub mod order;

pub use compile::{Guard, MatchPredicate, PatternSlot, Projection};
pub use context::{BoundFilter, BoundQuery, ContextBuilder, Direction, QueryContext};
pub use filter::{CmpOp, FilterExpr, Operand};
