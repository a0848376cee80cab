//! Row-wise computations
//!
//! A computation derives one new value per row, materialized as a new column
//! by [`Table::compute`]. Validation and per-table preparation (rank
//! ordering, percentile boundaries) run once, before any row is visited.

use std::sync::Arc;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::aggregate::Quantiles;
use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::types::{TypeKind, ValueType};
use crate::model::value::Value;
use crate::ops::KeySpec;

/// A user-supplied per-row function.
pub type ComputeFn = Arc<dyn Fn(&Row) -> Result<Value> + Send + Sync>;

/// The closed set of built-in computations, plus a custom-function escape
/// hatch with a declared result type.
#[derive(Clone)]
pub enum Computation {
    /// Difference between two columns: numeric, or temporal (dates and
    /// datetimes difference to a duration).
    Change { before: String, after: String },
    /// Percent change from `before` to `after`. A zero or null base yields
    /// null.
    PercentChange { before: String, after: String },
    /// Each value's share of the column total (or an explicit total).
    Percent {
        column: String,
        total: Option<Decimal>,
    },
    /// Competition ranking of rows by a key; equal keys share a rank and the
    /// next distinct key skips the tied positions.
    Rank { key: KeySpec, reverse: bool },
    /// The percentile bucket (0..=100) each value falls into.
    PercentileRank { column: String },
    /// User-supplied formula. With `cast` set, results are coerced through
    /// the declared type.
    Formula {
        data_type: ValueType,
        func: ComputeFn,
        cast: bool,
    },
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Computation::Change { .. } => "Change",
            Computation::PercentChange { .. } => "PercentChange",
            Computation::Percent { .. } => "Percent",
            Computation::Rank { .. } => "Rank",
            Computation::PercentileRank { .. } => "PercentileRank",
            Computation::Formula { .. } => "Formula",
        };
        write!(f, "Computation::{name}")
    }
}

/// Per-table state computed once by `prepare` and consumed by every `run`.
pub(crate) enum ComputeState {
    Stateless,
    Ranks {
        extractor: crate::ops::KeyExtractor,
        ranks: FxHashMap<Vec<Value>, usize>,
    },
    Percentiles(Quantiles),
    Total(Decimal),
}

/// Rank comparison: nulls rank last even when the order is reversed.
fn cmp_rank(a: &[Value], b: &[Value], reverse: bool) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = if x.is_null() || y.is_null() {
            x.cmp_null_max(y)
        } else if reverse {
            x.cmp_null_max(y).reverse()
        } else {
            x.cmp_null_max(y)
        };
        if ordering != std::cmp::Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

impl Computation {
    pub fn change(before: impl Into<String>, after: impl Into<String>) -> Self {
        Computation::Change {
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn percent_change(before: impl Into<String>, after: impl Into<String>) -> Self {
        Computation::PercentChange {
            before: before.into(),
            after: after.into(),
        }
    }

    pub fn percent(column: impl Into<String>) -> Self {
        Computation::Percent {
            column: column.into(),
            total: None,
        }
    }

    pub fn rank(key: impl Into<KeySpec>) -> Self {
        Computation::Rank {
            key: key.into(),
            reverse: false,
        }
    }

    pub fn rank_descending(key: impl Into<KeySpec>) -> Self {
        Computation::Rank {
            key: key.into(),
            reverse: true,
        }
    }

    pub fn percentile_rank(column: impl Into<String>) -> Self {
        Computation::PercentileRank {
            column: column.into(),
        }
    }

    pub fn formula<F>(data_type: ValueType, func: F) -> Self
    where
        F: Fn(&Row) -> Result<Value> + Send + Sync + 'static,
    {
        Computation::Formula {
            data_type,
            func: Arc::new(func),
            cast: true,
        }
    }

    /// The type of the column this computation produces.
    pub fn result_type(&self, table: &Table) -> Result<ValueType> {
        match self {
            Computation::Change { before, after } => {
                let (b, a) = (change_kind(table, before)?, change_kind(table, after)?);
                match (b, a) {
                    (TypeKind::Number, TypeKind::Number) => Ok(ValueType::number()),
                    _ => Ok(ValueType::duration()),
                }
            }
            Computation::PercentChange { .. }
            | Computation::Percent { .. }
            | Computation::Rank { .. }
            | Computation::PercentileRank { .. } => Ok(ValueType::number()),
            Computation::Formula { data_type, .. } => Ok(data_type.clone()),
        }
    }

    /// Check column existence and type compatibility before any row work.
    pub fn validate(&self, table: &Table) -> Result<()> {
        match self {
            Computation::Change { before, after } => {
                let b = change_kind(table, before)?;
                let a = change_kind(table, after)?;
                let compatible = matches!(
                    (b, a),
                    (TypeKind::Number, TypeKind::Number)
                        | (TypeKind::Date, TypeKind::Date)
                        | (TypeKind::DateTime, TypeKind::DateTime)
                        | (TypeKind::Duration, TypeKind::Duration)
                );
                if !compatible {
                    return Err(Error::DataType {
                        operation: "Change".to_string(),
                        data_type: format!("{b} and {a}"),
                    });
                }
                warn_on_nulls(table, before, "Change")?;
                warn_on_nulls(table, after, "Change")?;
                Ok(())
            }
            Computation::PercentChange { before, after } => {
                require_numeric(table, before, "PercentChange")?;
                require_numeric(table, after, "PercentChange")?;
                Ok(())
            }
            Computation::Percent { column, .. }
            | Computation::PercentileRank { column } => {
                require_numeric(table, column, self.operation_name())?;
                Ok(())
            }
            Computation::Rank { key, .. } => {
                key.resolve(table)?;
                Ok(())
            }
            Computation::Formula { .. } => Ok(()),
        }
    }

    fn operation_name(&self) -> &'static str {
        match self {
            Computation::Change { .. } => "Change",
            Computation::PercentChange { .. } => "PercentChange",
            Computation::Percent { .. } => "Percent",
            Computation::Rank { .. } => "Rank",
            Computation::PercentileRank { .. } => "PercentileRank",
            Computation::Formula { .. } => "Formula",
        }
    }

    /// Precompute per-table state.
    pub(crate) fn prepare(&self, table: &Table) -> Result<ComputeState> {
        match self {
            Computation::Rank { key, reverse } => {
                let extractor = key.resolve(table)?;
                let mut keys: Vec<Vec<Value>> = table
                    .rows()
                    .iter()
                    .map(|row| extractor.extract(row))
                    .collect();
                keys.sort_by(|a, b| cmp_rank(a, b, *reverse));
                let mut ranks: FxHashMap<Vec<Value>, usize> = FxHashMap::default();
                for (i, key) in keys.into_iter().enumerate() {
                    ranks.entry(key).or_insert(i + 1);
                }
                Ok(ComputeState::Ranks { extractor, ranks })
            }
            Computation::PercentileRank { column } => {
                let series: Vec<Decimal> = table
                    .column(column)?
                    .values_sorted()
                    .iter()
                    .filter_map(|v| v.as_number().copied())
                    .collect();
                Ok(ComputeState::Percentiles(Quantiles::percentiles(&series)?))
            }
            Computation::Percent { column, total } => {
                let total = match total {
                    Some(t) => *t,
                    None => {
                        let mut sum = Decimal::ZERO;
                        for value in table.column(column)?.values_without_nulls() {
                            if let Value::Number(d) = value {
                                sum += d;
                            }
                        }
                        sum
                    }
                };
                if total.is_zero() {
                    return Err(Error::DataType {
                        operation: "Percent".to_string(),
                        data_type: "a zero total".to_string(),
                    });
                }
                Ok(ComputeState::Total(total))
            }
            _ => Ok(ComputeState::Stateless),
        }
    }

    /// Derive the value for one row.
    pub(crate) fn run(&self, state: &ComputeState, row: &Row) -> Result<Value> {
        match self {
            Computation::Change { before, after } => {
                let b = row.value(before)?;
                let a = row.value(after)?;
                Ok(difference(b, a))
            }
            Computation::PercentChange { before, after } => {
                match (row.value(before)?, row.value(after)?) {
                    (Value::Number(b), Value::Number(a)) if !b.is_zero() => {
                        Ok(Value::Number((a - b) / b * Decimal::from(100)))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Computation::Percent { column, .. } => {
                let total = match state {
                    ComputeState::Total(t) => *t,
                    _ => return Ok(Value::Null),
                };
                match row.value(column)? {
                    Value::Number(d) => Ok(Value::Number(d / total * Decimal::from(100))),
                    _ => Ok(Value::Null),
                }
            }
            Computation::Rank { .. } => {
                let (extractor, ranks) = match state {
                    ComputeState::Ranks { extractor, ranks } => (extractor, ranks),
                    _ => return Ok(Value::Null),
                };
                let rank = ranks
                    .get(&extractor.extract(row))
                    .map(|&r| Value::Number(Decimal::from(r)))
                    .unwrap_or(Value::Null);
                Ok(rank)
            }
            Computation::PercentileRank { column } => {
                let quantiles = match state {
                    ComputeState::Percentiles(q) => q,
                    _ => return Ok(Value::Null),
                };
                match row.value(column)? {
                    Value::Null => Ok(Value::Null),
                    value => Ok(Value::Number(Decimal::from(quantiles.locate(value)?))),
                }
            }
            Computation::Formula { func, .. } => func(row),
        }
    }
}

/// Null-propagating difference: numbers subtract, temporal values yield
/// durations.
fn difference(before: &Value, after: &Value) -> Value {
    match (before, after) {
        (Value::Number(b), Value::Number(a)) => Value::Number(a - b),
        (Value::Date(b), Value::Date(a)) => Value::Duration(a.signed_duration_since(*b)),
        (Value::DateTime(b), Value::DateTime(a)) => {
            Value::Duration(a.signed_duration_since(*b))
        }
        (Value::Duration(b), Value::Duration(a)) => Value::Duration(*a - *b),
        _ => Value::Null,
    }
}

fn change_kind(table: &Table, column: &str) -> Result<TypeKind> {
    let idx = table.column_index(column)?;
    Ok(table.column_types()[idx].kind())
}

fn require_numeric(table: &Table, column: &str, operation: &str) -> Result<()> {
    let col = table.column(column)?;
    if !col.data_type().is_numeric() {
        return Err(Error::DataType {
            operation: operation.to_string(),
            data_type: col.data_type().kind().to_string(),
        });
    }
    warn_on_nulls(table, column, operation)
}

fn warn_on_nulls(table: &Table, column: &str, operation: &str) -> Result<()> {
    if table.column(column)?.has_nulls() {
        log::warn!(
            "column {column:?} contains nulls; {operation} yields null for those rows"
        );
    }
    Ok(())
}

impl Table {
    /// Append one new column per computation.
    ///
    /// All computations are validated (and their result types resolved)
    /// before any state is prepared or any row visited, so a bad computation
    /// has no side effects. The produced table has entirely new rows; the
    /// source rows are untouched.
    pub fn compute(&self, computations: &[(String, Computation)]) -> Result<Table> {
        let mut types = self.column_types().to_vec();
        let mut names = self.column_names().to_vec();
        for (name, computation) in computations {
            if names.contains(name) {
                return Err(Error::DuplicateColumnName(name.clone()));
            }
            computation.validate(self)?;
            names.push(name.clone());
            types.push(computation.result_type(self)?);
        }

        let states: Result<Vec<ComputeState>> = computations
            .iter()
            .map(|(_, c)| c.prepare(self))
            .collect();
        let states = states?;

        let names = std::sync::Arc::new(names);
        let types = std::sync::Arc::new(types);
        let mut rows = Vec::with_capacity(self.n_rows());
        for row in self.rows().iter() {
            let mut values = row.values().to_vec();
            for ((name_and_comp, state), data_type) in computations
                .iter()
                .zip(states.iter())
                .zip(types.iter().skip(self.n_columns()))
            {
                let (_, computation) = name_and_comp;
                let raw = computation.run(state, row)?;
                let value = match computation {
                    Computation::Formula { cast: false, .. } => raw,
                    _ => data_type.cast_value(&raw)?,
                };
                values.push(value);
            }
            rows.push(std::sync::Arc::new(Row::new(
                std::sync::Arc::clone(&names),
                values,
            )));
        }

        Ok(Table::with_schema(
            names,
            types,
            rows,
            self.row_names().map(|k| k.to_vec()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ValueType;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn table() -> Table {
        Table::from_values(
            vec![
                vec![Value::from(10i64), Value::from(15i64)],
                vec![Value::from(20i64), Value::from(10i64)],
                vec![Value::from(30i64), Value::Null],
                vec![Value::from(20i64), Value::from(40i64)],
            ],
            vec!["before".to_string(), "after".to_string()],
            vec![ValueType::number(), ValueType::number()],
        )
        .unwrap()
    }

    #[test]
    fn test_change_and_percent_change() {
        let t = table();
        let computed = t
            .compute(&[
                ("change".to_string(), Computation::change("before", "after")),
                (
                    "pct".to_string(),
                    Computation::percent_change("before", "after"),
                ),
            ])
            .unwrap();
        assert_eq!(computed.row(0).unwrap()[2], Value::Number(dec("5")));
        assert_eq!(computed.row(1).unwrap()[2], Value::Number(dec("-10")));
        assert_eq!(computed.row(2).unwrap()[2], Value::Null);
        assert_eq!(computed.row(0).unwrap()[3], Value::Number(dec("50")));
        // source table untouched
        assert_eq!(t.n_columns(), 2);
    }

    #[test]
    fn test_change_on_dates_yields_duration() {
        use chrono::NaiveDate;
        let d = |y, m, day| {
            Value::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap())
        };
        let t = Table::from_values(
            vec![vec![d(2024, 1, 1), d(2024, 1, 8)]],
            vec!["start".to_string(), "end".to_string()],
            vec![ValueType::date(), ValueType::date()],
        )
        .unwrap();
        let computed = t
            .compute(&[("span".to_string(), Computation::change("start", "end"))])
            .unwrap();
        assert_eq!(
            computed.row(0).unwrap()[2],
            Value::Duration(chrono::TimeDelta::days(7))
        );
        assert_eq!(computed.column_types()[2].kind(), TypeKind::Duration);
    }

    #[test]
    fn test_change_type_mismatch_fails_validation() {
        let t = Table::from_values(
            vec![vec![Value::from(1i64), Value::from("x")]],
            vec!["n".to_string(), "t".to_string()],
            vec![ValueType::number(), ValueType::text()],
        )
        .unwrap();
        assert!(matches!(
            t.compute(&[("c".to_string(), Computation::change("n", "t"))]),
            Err(Error::DataType { .. })
        ));
    }

    #[test]
    fn test_rank_competition_style() {
        let t = table();
        let ranked = t
            .compute(&[("rank".to_string(), Computation::rank("before"))])
            .unwrap();
        // before: 10, 20, 30, 20 -> ranks 1, 2, 4, 2
        let ranks: Vec<Value> = ranked.rows().iter().map(|r| r[2].clone()).collect();
        assert_eq!(
            ranks,
            vec![
                Value::from(1i64),
                Value::from(2i64),
                Value::from(4i64),
                Value::from(2i64)
            ]
        );
    }

    #[test]
    fn test_rank_descending_and_null_placement() {
        let t = table();
        let ranked = t
            .compute(&[(
                "rank".to_string(),
                Computation::rank_descending("after"),
            )])
            .unwrap();
        // after desc: 40, 15, 10, null -> row order 15->2, 10->3, null->4, 40->1
        let ranks: Vec<Value> = ranked.rows().iter().map(|r| r[2].clone()).collect();
        assert_eq!(
            ranks,
            vec![
                Value::from(2i64),
                Value::from(3i64),
                Value::from(4i64),
                Value::from(1i64)
            ]
        );
    }

    #[test]
    fn test_percent_of_total() {
        let t = table();
        let computed = t
            .compute(&[("share".to_string(), Computation::percent("before"))])
            .unwrap();
        assert_eq!(computed.row(0).unwrap()[2], Value::Number(dec("12.5")));
    }

    #[test]
    fn test_percentile_rank() {
        let t = Table::from_values(
            (1..=100).map(|i| vec![Value::from(i as i64)]).collect(),
            vec!["n".to_string()],
            vec![ValueType::number()],
        )
        .unwrap();
        let computed = t
            .compute(&[("pr".to_string(), Computation::percentile_rank("n"))])
            .unwrap();
        assert_eq!(computed.row(99).unwrap()[1], Value::from(100i64));
        assert_eq!(computed.row(0).unwrap()[1], Value::from(0i64));
    }

    #[test]
    fn test_formula_with_cast() {
        let t = table();
        let computed = t
            .compute(&[(
                "double".to_string(),
                Computation::formula(ValueType::number(), |row: &Row| {
                    match row.value("before")? {
                        Value::Number(d) => Ok(Value::Number(d * Decimal::from(2))),
                        _ => Ok(Value::Null),
                    }
                }),
            )])
            .unwrap();
        assert_eq!(computed.row(1).unwrap()[2], Value::from(40i64));
    }

    #[test]
    fn test_compute_produces_new_row_objects() {
        let t = table();
        let computed = t
            .compute(&[("c".to_string(), Computation::change("before", "after"))])
            .unwrap();
        for i in 0..t.n_rows() {
            assert!(!std::sync::Arc::ptr_eq(
                t.row(i).unwrap(),
                computed.row(i).unwrap()
            ));
        }
    }

    #[test]
    fn test_duplicate_computed_name_rejected() {
        let t = table();
        assert!(matches!(
            t.compute(&[("before".to_string(), Computation::percent("before"))]),
            Err(Error::DuplicateColumnName(_))
        ));
    }
}
