//! Query context: the canonical intermediate representation of one logical
//! query, built once and re-bound with fresh parameter values per execution.
//!
//! Building resolves every column reference against the schema (unknown
//! columns fail with a `CompileError`) and records parameter placeholder
//! positions without evaluating them. Binding substitutes concrete values;
//! nothing compiled is ever reused across different parameter sets.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Error};
use crate::query::filter::{CmpOp, FilterExpr, MAX_EXPRESSION_DEPTH, Operand};
use crate::types::{Datum, Record, TableDef};

/// Sort direction for one ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// A position-resolved filter node. Same shape as [`FilterExpr`] with
/// column names replaced by tuple positions; parameters still unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum FilterNode {
    Compare(usize, CmpOp, Operand),
    In(usize, Vec<Operand>),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

/// A fully bound filter node: positions and concrete values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundFilter {
    Compare(usize, CmpOp, Datum),
    In(usize, Vec<Datum>),
    And(Vec<BoundFilter>),
    Or(Vec<BoundFilter>),
    Not(Box<BoundFilter>),
}

impl BoundFilter {
    /// Evaluate against a row. Total `Datum` order makes every comparison
    /// well-defined, including cross-kind ones.
    pub fn eval(&self, row: &Record) -> bool {
        match self {
            BoundFilter::Compare(pos, op, value) => op.test(row[*pos].cmp(value)),
            BoundFilter::In(pos, values) => values.contains(&row[*pos]),
            BoundFilter::And(children) => children.iter().all(|c| c.eval(row)),
            BoundFilter::Or(children) => children.iter().any(|c| c.eval(row)),
            BoundFilter::Not(child) => !child.eval(row),
        }
    }
}

/// The canonical, schema-validated form of one logical query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub(crate) table: String,
    pub(crate) arity: usize,
    pub(crate) filter: Option<FilterNode>,
    pub(crate) order: Vec<(usize, Direction)>,
    pub(crate) limit: Option<usize>,
    pub(crate) projection: Option<Vec<usize>>,
}

/// A query context with its parameter placeholders substituted. Input to
/// the predicate compiler and the execution surface.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub(crate) table: String,
    pub(crate) arity: usize,
    pub(crate) filter: Option<BoundFilter>,
    pub(crate) order: Vec<(usize, Direction)>,
    pub(crate) limit: Option<usize>,
    pub(crate) projection: Option<Vec<usize>>,
}

impl BoundQuery {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn order(&self) -> &[(usize, Direction)] {
        &self.order
    }
}

impl QueryContext {
    /// Start building a context for the given table definition.
    pub fn for_table(def: &TableDef) -> ContextBuilder {
        ContextBuilder::new(def.name.clone(), def.columns.clone())
    }

    /// Start building a context from a table name and an explicit schema
    /// field list (the shape the external query front end supplies).
    pub fn new(
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> ContextBuilder {
        ContextBuilder::new(
            table.into(),
            columns.into_iter().map(Into::into).collect(),
        )
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Substitute parameter values, producing an executable query.
    ///
    /// Fails with `CompileError::ParamOutOfRange` if the filter references
    /// a placeholder index not covered by `params`.
    pub fn bind(&self, params: &[Datum]) -> Result<BoundQuery, Error> {
        let filter = self
            .filter
            .as_ref()
            .map(|f| bind_node(f, params))
            .transpose()?;
        Ok(BoundQuery {
            table: self.table.clone(),
            arity: self.arity,
            filter,
            order: self.order.clone(),
            limit: self.limit,
            projection: self.projection.clone(),
        })
    }
}

fn bind_operand(op: &Operand, params: &[Datum]) -> Result<Datum, CompileError> {
    match op {
        Operand::Value(v) => Ok(v.clone()),
        Operand::Param(i) => params.get(*i).cloned().ok_or(CompileError::ParamOutOfRange {
            index: *i,
            provided: params.len(),
        }),
    }
}

fn bind_node(node: &FilterNode, params: &[Datum]) -> Result<BoundFilter, CompileError> {
    Ok(match node {
        FilterNode::Compare(pos, op, operand) => {
            BoundFilter::Compare(*pos, *op, bind_operand(operand, params)?)
        }
        FilterNode::In(pos, operands) => BoundFilter::In(
            *pos,
            operands
                .iter()
                .map(|o| bind_operand(o, params))
                .collect::<Result<_, _>>()?,
        ),
        FilterNode::And(children) => BoundFilter::And(
            children
                .iter()
                .map(|c| bind_node(c, params))
                .collect::<Result<_, _>>()?,
        ),
        FilterNode::Or(children) => BoundFilter::Or(
            children
                .iter()
                .map(|c| bind_node(c, params))
                .collect::<Result<_, _>>()?,
        ),
        FilterNode::Not(child) => BoundFilter::Not(Box::new(bind_node(child, params)?)),
    })
}

/// Builder for a [`QueryContext`]. Chaining is infallible; all validation
/// happens in [`ContextBuilder::build`].
pub struct ContextBuilder {
    table: String,
    columns: Vec<String>,
    filter: Option<FilterExpr>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
    projection: Option<Vec<String>>,
}

impl ContextBuilder {
    fn new(table: String, columns: Vec<String>) -> Self {
        ContextBuilder {
            table,
            columns,
            filter: None,
            order: Vec::new(),
            limit: None,
            projection: None,
        }
    }

    /// Set the per-row filter. Absent means match-all.
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(expr);
        self
    }

    /// Append one ordering key; keys apply in call order, first is primary.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    /// Truncate results to at most `n` rows (applied after ordering).
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Emit only the named columns. The primary key is always included
    /// first regardless.
    pub fn project(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Resolve and validate every column reference, producing the
    /// canonical context.
    pub fn build(self) -> Result<QueryContext, Error> {
        let position = |column: &str| -> Result<usize, CompileError> {
            self.columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| CompileError::UnknownColumn {
                    table: self.table.clone(),
                    column: column.to_string(),
                })
        };

        let filter = match &self.filter {
            Some(expr) => {
                if expr.depth() > MAX_EXPRESSION_DEPTH {
                    return Err(CompileError::DepthExceeded {
                        max: MAX_EXPRESSION_DEPTH,
                    }
                    .into());
                }
                Some(resolve_node(expr, &position)?)
            }
            None => None,
        };

        let order = self
            .order
            .iter()
            .map(|(col, dir)| Ok((position(col)?, *dir)))
            .collect::<Result<Vec<_>, CompileError>>()?;

        let projection = self
            .projection
            .as_ref()
            .map(|cols| {
                cols.iter()
                    .map(|c| position(c))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(QueryContext {
            table: self.table,
            arity: self.columns.len(),
            filter,
            order,
            limit: self.limit,
            projection,
        })
    }
}

fn resolve_node(
    expr: &FilterExpr,
    position: &impl Fn(&str) -> Result<usize, CompileError>,
) -> Result<FilterNode, CompileError> {
    Ok(match expr {
        FilterExpr::Compare(col, op, operand) => {
            FilterNode::Compare(position(col)?, *op, operand.clone())
        }
        FilterExpr::In(col, operands) => FilterNode::In(position(col)?, operands.clone()),
        FilterExpr::And(children) => FilterNode::And(
            children
                .iter()
                .map(|c| resolve_node(c, position))
                .collect::<Result<_, _>>()?,
        ),
        FilterExpr::Or(children) => FilterNode::Or(
            children
                .iter()
                .map(|c| resolve_node(c, position))
                .collect::<Result<_, _>>()?,
        ),
        FilterExpr::Not(child) => FilterNode::Not(Box::new(resolve_node(child, position)?)),
    })
}
