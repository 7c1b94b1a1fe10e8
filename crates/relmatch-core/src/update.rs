//! Update specifications and their application to existing records.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Error, UpdateError};
use crate::types::{Datum, Record, TableDef};

/// An individual field-assignment operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateAction {
    /// Replace the column value.
    Set(Datum),
    /// Add to a numeric column.
    Incr(i64),
    /// Subtract from a numeric column.
    Decr(i64),
    /// Append an element to a list column.
    Push(Datum),
    /// Remove every element equal to the value from a list column.
    Pull(Datum),
}

impl UpdateAction {
    fn name(&self) -> &'static str {
        match self {
            UpdateAction::Set(_) => "set",
            UpdateAction::Incr(_) => "increment",
            UpdateAction::Decr(_) => "decrement",
            UpdateAction::Push(_) => "push",
            UpdateAction::Pull(_) => "pull",
        }
    }
}

/// One (column, operation) pair of an update specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOp {
    pub column: String,
    pub action: UpdateAction,
}

impl UpdateOp {
    pub fn set(column: impl Into<String>, value: impl Into<Datum>) -> Self {
        UpdateOp {
            column: column.into(),
            action: UpdateAction::Set(value.into()),
        }
    }

    pub fn incr(column: impl Into<String>, delta: i64) -> Self {
        UpdateOp {
            column: column.into(),
            action: UpdateAction::Incr(delta),
        }
    }

    pub fn decr(column: impl Into<String>, delta: i64) -> Self {
        UpdateOp {
            column: column.into(),
            action: UpdateAction::Decr(delta),
        }
    }

    pub fn push(column: impl Into<String>, value: impl Into<Datum>) -> Self {
        UpdateOp {
            column: column.into(),
            action: UpdateAction::Push(value.into()),
        }
    }

    pub fn pull(column: impl Into<String>, value: impl Into<Datum>) -> Self {
        UpdateOp {
            column: column.into(),
            action: UpdateAction::Pull(value.into()),
        }
    }
}

/// Apply an update specification to an existing record, producing the
/// replacement record of the same arity.
///
/// Operations apply independently, in order; unmentioned columns carry
/// over unchanged. The primary key changes only when an operation
/// explicitly targets column 0 — the caller is responsible for re-checking
/// key uniqueness when it does.
pub fn apply_update(record: &Record, ops: &[UpdateOp], def: &TableDef) -> Result<Record, Error> {
    let mut values = record.0.clone();

    for op in ops {
        let pos = def
            .position_of(&op.column)
            .ok_or_else(|| CompileError::UnknownColumn {
                table: def.name.clone(),
                column: op.column.clone(),
            })?;
        values[pos] = apply_action(&values[pos], &op.action, &op.column)?;
    }

    Ok(Record(values))
}

fn apply_action(current: &Datum, action: &UpdateAction, column: &str) -> Result<Datum, Error> {
    let mismatch = || {
        Error::from(UpdateError::KindMismatch {
            column: column.to_string(),
            action: action.name(),
            found: current.kind_name(),
        })
    };

    Ok(match action {
        UpdateAction::Set(value) => value.clone(),
        UpdateAction::Incr(delta) => match current {
            Datum::Int(i) => Datum::Int(i.wrapping_add(*delta)),
            Datum::Float(f) => Datum::Float(f + *delta as f64),
            _ => return Err(mismatch()),
        },
        UpdateAction::Decr(delta) => match current {
            Datum::Int(i) => Datum::Int(i.wrapping_sub(*delta)),
            Datum::Float(f) => Datum::Float(f - *delta as f64),
            _ => return Err(mismatch()),
        },
        UpdateAction::Push(value) => match current {
            Datum::List(items) => {
                let mut items = items.clone();
                items.push(value.clone());
                Datum::List(items)
            }
            _ => return Err(mismatch()),
        },
        UpdateAction::Pull(value) => match current {
            Datum::List(items) => {
                Datum::List(items.iter().filter(|i| *i != value).cloned().collect())
            }
            _ => return Err(mismatch()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rec;
    use crate::types::{StorageMedium, TableKind};

    fn counters() -> TableDef {
        TableDef::new(
            "counters",
            TableKind::Set,
            ["id", "value", "tags"],
            StorageMedium::Memory,
        )
    }

    #[test]
    fn test_set_replaces_value() {
        let def = counters();
        let row = rec![1, 10, Vec::<Datum>::new()];
        let out = apply_update(&row, &[UpdateOp::set("value", 5)], &def).unwrap();
        assert_eq!(out, rec![1, 5, Vec::<Datum>::new()]);
    }

    #[test]
    fn test_set_is_idempotent() {
        let def = counters();
        let spec = [UpdateOp::set("value", 5)];
        let once = apply_update(&rec![1, 10, Vec::<Datum>::new()], &spec, &def).unwrap();
        let twice = apply_update(&once, &spec, &def).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unmentioned_columns_carry_over() {
        let def = counters();
        let row = rec![1, 10, vec![Datum::Int(9)]];
        let out = apply_update(&row, &[UpdateOp::set("value", 0)], &def).unwrap();
        assert_eq!(out.key(), &Datum::Int(1));
        assert_eq!(out[2], Datum::List(vec![Datum::Int(9)]));
    }

    #[test]
    fn test_incr_decr_on_numbers() {
        let def = counters();
        let row = rec![1, 10, Vec::<Datum>::new()];
        let out = apply_update(&row, &[UpdateOp::incr("value", 3)], &def).unwrap();
        assert_eq!(out[1], Datum::Int(13));
        let out = apply_update(&out, &[UpdateOp::decr("value", 20)], &def).unwrap();
        assert_eq!(out[1], Datum::Int(-7));

        let row = rec![1, 1.5, Vec::<Datum>::new()];
        let out = apply_update(&row, &[UpdateOp::incr("value", 1)], &def).unwrap();
        assert_eq!(out[1], Datum::Float(2.5));
    }

    #[test]
    fn test_incr_on_non_numeric_fails() {
        let def = counters();
        let row = rec![1, "ten", Vec::<Datum>::new()];
        let err = apply_update(&row, &[UpdateOp::incr("value", 1)], &def).unwrap_err();
        assert!(matches!(
            err,
            Error::Update(UpdateError::KindMismatch {
                action: "increment",
                found: "string",
                ..
            })
        ));
    }

    #[test]
    fn test_push_and_pull() {
        let def = counters();
        let row = rec![1, 0, vec![Datum::Int(1), Datum::Int(2)]];
        let out = apply_update(&row, &[UpdateOp::push("tags", 3)], &def).unwrap();
        assert_eq!(
            out[2],
            Datum::List(vec![Datum::Int(1), Datum::Int(2), Datum::Int(3)])
        );

        let row = rec![1, 0, vec![Datum::Int(2), Datum::Int(1), Datum::Int(2)]];
        let out = apply_update(&row, &[UpdateOp::pull("tags", 2)], &def).unwrap();
        assert_eq!(out[2], Datum::List(vec![Datum::Int(1)]));
    }

    #[test]
    fn test_pull_on_non_list_fails() {
        let def = counters();
        let row = rec![1, 7, Vec::<Datum>::new()];
        let err = apply_update(&row, &[UpdateOp::pull("value", 7)], &def).unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::KindMismatch { .. })));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let def = counters();
        let row = rec![1, 0, Vec::<Datum>::new()];
        let err = apply_update(&row, &[UpdateOp::set("missing", 1)], &def).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::UnknownColumn { ref column, .. }) if column == "missing"
        ));
    }

    #[test]
    fn test_ops_apply_in_order() {
        let def = counters();
        let row = rec![1, 0, Vec::<Datum>::new()];
        let out = apply_update(
            &row,
            &[
                UpdateOp::set("value", 10),
                UpdateOp::incr("value", 5),
                UpdateOp::decr("value", 1),
            ],
            &def,
        )
        .unwrap();
        assert_eq!(out[1], Datum::Int(14));
    }

    #[test]
    fn test_explicit_key_update_changes_key() {
        let def = counters();
        let row = rec![1, 0, Vec::<Datum>::new()];
        let out = apply_update(&row, &[UpdateOp::set("id", 2)], &def).unwrap();
        assert_eq!(out.key(), &Datum::Int(2));
    }
}
