//! Predicate compiler: lowers a bound query into the store's native
//! selection predicate.
//!
//! The native predicate is a (pattern, guards, projection) triple. The
//! pattern fixes tuple positions to exact values; guards are a conjunctive
//! list of atomic conditions over positions. The guard language has no
//! or/not combinators, so disjunctive or negated subtrees compile into a
//! `residual` filter evaluated after selection — a correctness-preserving
//! escape valve, slower than native guards but never silently dropped.
//!
//! Compilation is a pure function of the bound query: identical inputs
//! always produce identical predicates.

use crate::error::CompileError;
use crate::query::context::{BoundFilter, BoundQuery};
use crate::query::filter::CmpOp;
use crate::types::{Datum, Record};

/// One tuple position in the selection pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternSlot {
    /// The position must equal this value.
    Exact(Datum),
    /// Wildcard: any value.
    Any,
}

/// An atomic guard condition over one tuple position. Guards combine by
/// conjunction only.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    Cmp {
        pos: usize,
        op: CmpOp,
        value: Datum,
    },
    In {
        pos: usize,
        values: Vec<Datum>,
    },
}

impl Guard {
    fn eval(&self, row: &Record) -> bool {
        match self {
            Guard::Cmp { pos, op, value } => op.test(row[*pos].cmp(value)),
            Guard::In { pos, values } => values.contains(&row[*pos]),
        }
    }
}

/// Which tuple positions the predicate emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// The full tuple.
    All,
    /// Selected positions. Position 0 (the primary key) is always first,
    /// so every projected row remains addressable for delete/update.
    Columns(Vec<usize>),
}

/// A compiled native selection predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPredicate {
    pub pattern: Vec<PatternSlot>,
    pub guards: Vec<Guard>,
    /// Post-selection filter for constructs the native guards cannot
    /// express (disjunction, negation).
    pub residual: Option<BoundFilter>,
    pub projection: Projection,
}

impl MatchPredicate {
    /// The exact primary-key value this predicate fixes, if any.
    pub fn key_equality(&self) -> Option<&Datum> {
        match self.pattern.first() {
            Some(PatternSlot::Exact(v)) => Some(v),
            _ => None,
        }
    }

    /// Full row test: pattern, then guards, then the residual filter.
    pub fn matches(&self, row: &Record) -> bool {
        debug_assert_eq!(row.arity(), self.pattern.len());
        for (pos, slot) in self.pattern.iter().enumerate() {
            if let PatternSlot::Exact(v) = slot
                && &row[pos] != v
            {
                return false;
            }
        }
        if !self.guards.iter().all(|g| g.eval(row)) {
            return false;
        }
        match &self.residual {
            Some(f) => f.eval(row),
            None => true,
        }
    }

    /// Emit the projected form of a matching row.
    pub fn project(&self, row: &Record) -> Record {
        match &self.projection {
            Projection::All => row.clone(),
            Projection::Columns(positions) => {
                Record(positions.iter().map(|&p| row[p].clone()).collect())
            }
        }
    }
}

/// An atomic constraint pulled out of the conjunctive spine of the filter.
enum Atom {
    Cmp { op: CmpOp, value: Datum },
    In { values: Vec<Datum> },
}

/// Compile a bound query into a native selection predicate.
///
/// Pure: no side effects, deterministic for identical inputs.
pub fn compile(query: &BoundQuery) -> Result<MatchPredicate, CompileError> {
    let arity = query.arity;

    // 1. Split the filter into per-position conjunctive atoms plus the
    //    residual subtrees the guard language cannot express.
    let mut per_pos: Vec<Vec<Atom>> = (0..arity).map(|_| Vec::new()).collect();
    let mut residual_parts: Vec<BoundFilter> = Vec::new();
    if let Some(filter) = &query.filter {
        collect_conjuncts(filter, &mut per_pos, &mut residual_parts);
    }

    // 2. A position constrained by exactly one equality atom becomes a
    //    fixed pattern value; every other atom becomes a guard. Positions
    //    are visited in tuple order, keeping output canonical.
    let mut pattern = Vec::with_capacity(arity);
    let mut guards = Vec::new();
    for (pos, atoms) in per_pos.into_iter().enumerate() {
        match atoms.as_slice() {
            [Atom::Cmp {
                op: CmpOp::Eq,
                value,
            }] => {
                pattern.push(PatternSlot::Exact(value.clone()));
                continue;
            }
            _ => pattern.push(PatternSlot::Any),
        }
        for atom in atoms {
            guards.push(match atom {
                Atom::Cmp { op, value } => Guard::Cmp { pos, op, value },
                Atom::In { values } => Guard::In { pos, values },
            });
        }
    }

    let residual = match residual_parts.len() {
        0 => None,
        1 => Some(residual_parts.into_iter().next().expect("len checked")),
        _ => Some(BoundFilter::And(residual_parts)),
    };

    // 3. Projection: requested positions, primary key always first.
    let projection = match &query.projection {
        None => Projection::All,
        Some(requested) => {
            let mut positions = vec![0];
            for &p in requested {
                if !positions.contains(&p) {
                    positions.push(p);
                }
            }
            Projection::Columns(positions)
        }
    };

    Ok(MatchPredicate {
        pattern,
        guards,
        residual,
        projection,
    })
}

/// Walk the conjunctive spine of a bound filter. `Compare`/`In` leaves land
/// in `per_pos`; `Or`/`Not` subtrees (in any conjunctive position) go to
/// `residual` whole.
fn collect_conjuncts(
    node: &BoundFilter,
    per_pos: &mut [Vec<Atom>],
    residual: &mut Vec<BoundFilter>,
) {
    match node {
        BoundFilter::Compare(pos, op, value) => per_pos[*pos].push(Atom::Cmp {
            op: *op,
            value: value.clone(),
        }),
        BoundFilter::In(pos, values) => per_pos[*pos].push(Atom::In {
            values: values.clone(),
        }),
        BoundFilter::And(children) => {
            for child in children {
                collect_conjuncts(child, per_pos, residual);
            }
        }
        BoundFilter::Or(_) | BoundFilter::Not(_) => residual.push(node.clone()),
    }
}
