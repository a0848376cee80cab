//! Column aggregations
//!
//! Aggregations are stateless per call: `validate` is checked once against
//! the table (raising typed errors before any work happens), then `run`
//! reduces a column to a single value. Numeric aggregations silently exclude
//! nulls and surface a warning instead of failing.

pub mod quantiles;

pub use quantiles::Quantiles;

use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::{Error, Result};
use crate::model::column::Column;
use crate::model::table::Table;
use crate::model::types::{TypeKind, ValueType};
use crate::model::value::Value;

/// A user-supplied predicate over a single value.
pub type TestFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A user-supplied whole-table reduction.
pub type CustomAggFn = Arc<dyn Fn(&Table) -> Result<Value> + Send + Sync>;

/// The closed set of built-in aggregations, plus a custom-function escape
/// hatch carrying its declared result type.
#[derive(Clone)]
pub enum Aggregation {
    /// Row count; with a column, its non-null count; with a column and a
    /// value, the number of occurrences of that value.
    Count {
        column: Option<String>,
        value: Option<Value>,
    },
    Sum { column: String },
    Min { column: String },
    Max { column: String },
    Mean { column: String },
    Median { column: String },
    Mode { column: String },
    Variance { column: String },
    PopulationVariance { column: String },
    StDev { column: String },
    PopulationStDev { column: String },
    /// Mean absolute deviation.
    Mad { column: String },
    MaxLength { column: String },
    MaxPrecision { column: String },
    HasNulls { column: String },
    Any { column: String, test: TestFn },
    All { column: String, test: TestFn },
    Iqr { column: String },
    Percentiles { column: String },
    Quartiles { column: String },
    Quintiles { column: String },
    Deciles { column: String },
    Custom {
        name: String,
        data_type: ValueType,
        func: CustomAggFn,
    },
}

impl std::fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Aggregation::{}", self.name())
    }
}

/// What an aggregation produces: a single value, or a quantile sequence for
/// the percentile family.
#[derive(Debug, Clone)]
pub enum AggregateResult {
    Value(Value),
    Quantiles(Quantiles),
}

impl AggregateResult {
    /// Unwrap a single-valued result; quantile sequences are an error.
    pub fn into_value(self) -> Result<Value> {
        match self {
            AggregateResult::Value(v) => Ok(v),
            AggregateResult::Quantiles(_) => Err(Error::UnsupportedAggregation(
                "a quantile sequence is not a single value".to_string(),
            )),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AggregateResult::Value(v) => Some(v),
            AggregateResult::Quantiles(_) => None,
        }
    }

    pub fn as_quantiles(&self) -> Option<&Quantiles> {
        match self {
            AggregateResult::Quantiles(q) => Some(q),
            AggregateResult::Value(_) => None,
        }
    }
}

impl Aggregation {
    pub fn count() -> Self {
        Aggregation::Count {
            column: None,
            value: None,
        }
    }

    pub fn count_column(column: impl Into<String>) -> Self {
        Aggregation::Count {
            column: Some(column.into()),
            value: None,
        }
    }

    pub fn count_value(column: impl Into<String>, value: Value) -> Self {
        Aggregation::Count {
            column: Some(column.into()),
            value: Some(value),
        }
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Aggregation::Sum {
            column: column.into(),
        }
    }

    pub fn mean(column: impl Into<String>) -> Self {
        Aggregation::Mean {
            column: column.into(),
        }
    }

    pub fn median(column: impl Into<String>) -> Self {
        Aggregation::Median {
            column: column.into(),
        }
    }

    pub fn min(column: impl Into<String>) -> Self {
        Aggregation::Min {
            column: column.into(),
        }
    }

    pub fn max(column: impl Into<String>) -> Self {
        Aggregation::Max {
            column: column.into(),
        }
    }

    /// True when any value in the column satisfies the test.
    pub fn any<F>(column: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Aggregation::Any {
            column: column.into(),
            test: Arc::new(test),
        }
    }

    /// True when every value in the column satisfies the test.
    pub fn all<F>(column: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Aggregation::All {
            column: column.into(),
            test: Arc::new(test),
        }
    }

    pub fn custom<F>(name: impl Into<String>, data_type: ValueType, func: F) -> Self
    where
        F: Fn(&Table) -> Result<Value> + Send + Sync + 'static,
    {
        Aggregation::Custom {
            name: name.into(),
            data_type,
            func: Arc::new(func),
        }
    }

    /// The aggregation's display name, used as the default result-column
    /// name in grouped aggregation.
    pub fn name(&self) -> String {
        match self {
            Aggregation::Count { .. } => "Count".to_string(),
            Aggregation::Sum { .. } => "Sum".to_string(),
            Aggregation::Min { .. } => "Min".to_string(),
            Aggregation::Max { .. } => "Max".to_string(),
            Aggregation::Mean { .. } => "Mean".to_string(),
            Aggregation::Median { .. } => "Median".to_string(),
            Aggregation::Mode { .. } => "Mode".to_string(),
            Aggregation::Variance { .. } => "Variance".to_string(),
            Aggregation::PopulationVariance { .. } => "PopulationVariance".to_string(),
            Aggregation::StDev { .. } => "StDev".to_string(),
            Aggregation::PopulationStDev { .. } => "PopulationStDev".to_string(),
            Aggregation::Mad { .. } => "Mad".to_string(),
            Aggregation::MaxLength { .. } => "MaxLength".to_string(),
            Aggregation::MaxPrecision { .. } => "MaxPrecision".to_string(),
            Aggregation::HasNulls { .. } => "HasNulls".to_string(),
            Aggregation::Any { .. } => "Any".to_string(),
            Aggregation::All { .. } => "All".to_string(),
            Aggregation::Iqr { .. } => "Iqr".to_string(),
            Aggregation::Percentiles { .. } => "Percentiles".to_string(),
            Aggregation::Quartiles { .. } => "Quartiles".to_string(),
            Aggregation::Quintiles { .. } => "Quintiles".to_string(),
            Aggregation::Deciles { .. } => "Deciles".to_string(),
            Aggregation::Custom { name, .. } => name.clone(),
        }
    }

    /// The type of the single value this aggregation produces per group, or
    /// an error for aggregations that cannot be lifted into one column.
    pub fn aggregate_data_type(&self, table: &Table) -> Result<ValueType> {
        match self {
            Aggregation::Count { .. }
            | Aggregation::Sum { .. }
            | Aggregation::Mean { .. }
            | Aggregation::Median { .. }
            | Aggregation::Variance { .. }
            | Aggregation::PopulationVariance { .. }
            | Aggregation::StDev { .. }
            | Aggregation::PopulationStDev { .. }
            | Aggregation::Mad { .. }
            | Aggregation::MaxLength { .. }
            | Aggregation::MaxPrecision { .. }
            | Aggregation::Iqr { .. } => Ok(ValueType::number()),
            Aggregation::HasNulls { .. }
            | Aggregation::Any { .. }
            | Aggregation::All { .. } => Ok(ValueType::boolean()),
            Aggregation::Min { column }
            | Aggregation::Max { column }
            | Aggregation::Mode { column } => {
                let idx = table.column_index(column)?;
                Ok(table.column_types()[idx].clone())
            }
            Aggregation::Percentiles { .. }
            | Aggregation::Quartiles { .. }
            | Aggregation::Quintiles { .. }
            | Aggregation::Deciles { .. } => {
                Err(Error::UnsupportedAggregation(self.name()))
            }
            Aggregation::Custom { data_type, .. } => Ok(data_type.clone()),
        }
    }

    /// Check the target column's existence and type compatibility, before
    /// any computation runs. Columns with nulls feeding a numeric
    /// calculation produce a warning, never an error; the nulls are excluded
    /// by `run`.
    pub fn validate(&self, table: &Table) -> Result<()> {
        match self {
            Aggregation::Count { column, .. } => {
                if let Some(column) = column {
                    table.column_index(column)?;
                }
                Ok(())
            }
            Aggregation::Sum { column }
            | Aggregation::Mean { column }
            | Aggregation::Median { column }
            | Aggregation::Variance { column }
            | Aggregation::PopulationVariance { column }
            | Aggregation::StDev { column }
            | Aggregation::PopulationStDev { column }
            | Aggregation::Mad { column }
            | Aggregation::MaxPrecision { column }
            | Aggregation::Iqr { column }
            | Aggregation::Percentiles { column }
            | Aggregation::Quartiles { column }
            | Aggregation::Quintiles { column }
            | Aggregation::Deciles { column } => {
                let col = table.column(column)?;
                if !col.data_type().is_numeric() {
                    return Err(Error::DataType {
                        operation: self.name(),
                        data_type: col.data_type().kind().to_string(),
                    });
                }
                warn_on_nulls(&self.name(), col);
                Ok(())
            }
            Aggregation::Min { column } | Aggregation::Max { column } => {
                let col = table.column(column)?;
                let data_type = col.data_type();
                if !data_type.is_numeric() && !data_type.is_temporal() {
                    return Err(Error::DataType {
                        operation: self.name(),
                        data_type: data_type.kind().to_string(),
                    });
                }
                Ok(())
            }
            Aggregation::MaxLength { column } => {
                let col = table.column(column)?;
                if col.data_type().kind() != TypeKind::Text {
                    return Err(Error::DataType {
                        operation: self.name(),
                        data_type: col.data_type().kind().to_string(),
                    });
                }
                Ok(())
            }
            Aggregation::Mode { column }
            | Aggregation::HasNulls { column }
            | Aggregation::Any { column, .. }
            | Aggregation::All { column, .. } => {
                table.column_index(column)?;
                Ok(())
            }
            Aggregation::Custom { .. } => Ok(()),
        }
    }

    /// Reduce the table to a single result. Pure; all failure modes are
    /// caught by `validate` except empty-series errors in the percentile
    /// family.
    pub fn run(&self, table: &Table) -> Result<AggregateResult> {
        let value = match self {
            Aggregation::Count { column, value } => {
                let count = match (column, value) {
                    (None, _) => table.n_rows(),
                    (Some(column), None) => {
                        table.column(column)?.values_without_nulls().len()
                    }
                    (Some(column), Some(needle)) => table
                        .column(column)?
                        .iter()
                        .filter(|v| *v == needle)
                        .count(),
                };
                Value::Number(Decimal::from(count))
            }
            Aggregation::Sum { column } => {
                let series = numeric_series(table, column)?;
                Value::Number(series.iter().sum())
            }
            Aggregation::Min { column } => {
                extremum(table, column, std::cmp::Ordering::Less)?
            }
            Aggregation::Max { column } => {
                extremum(table, column, std::cmp::Ordering::Greater)?
            }
            Aggregation::Mean { column } => {
                let series = numeric_series(table, column)?;
                match mean(&series) {
                    Some(m) => Value::Number(m),
                    None => Value::Null,
                }
            }
            Aggregation::Median { column } => {
                let series = sorted_numeric_series(table, column)?;
                if series.is_empty() {
                    Value::Null
                } else {
                    Quantiles::percentiles(&series)?[50].clone()
                }
            }
            Aggregation::Mode { column } => {
                let mut counts: IndexMap<Value, usize> = IndexMap::new();
                for value in table.column(column)?.values_without_nulls() {
                    *counts.entry(value.clone()).or_insert(0) += 1;
                }
                // ties resolve to the first value reaching the maximum count
                let mut best: Option<(&Value, usize)> = None;
                for (value, &count) in &counts {
                    if best.map_or(true, |(_, max)| count > max) {
                        best = Some((value, count));
                    }
                }
                best.map(|(value, _)| value.clone()).unwrap_or(Value::Null)
            }
            Aggregation::Variance { column } => {
                let series = numeric_series(table, column)?;
                match variance(&series, true) {
                    Some(v) => Value::Number(v),
                    None => Value::Null,
                }
            }
            Aggregation::PopulationVariance { column } => {
                let series = numeric_series(table, column)?;
                match variance(&series, false) {
                    Some(v) => Value::Number(v),
                    None => Value::Null,
                }
            }
            Aggregation::StDev { column } => {
                let series = numeric_series(table, column)?;
                match variance(&series, true) {
                    // variance is non-negative, sqrt cannot fail
                    Some(v) => Value::Number(v.sqrt().unwrap_or(Decimal::ZERO)),
                    None => Value::Null,
                }
            }
            Aggregation::PopulationStDev { column } => {
                let series = numeric_series(table, column)?;
                match variance(&series, false) {
                    Some(v) => Value::Number(v.sqrt().unwrap_or(Decimal::ZERO)),
                    None => Value::Null,
                }
            }
            Aggregation::Mad { column } => {
                let series = numeric_series(table, column)?;
                match mean(&series) {
                    Some(m) => {
                        let deviations: Vec<Decimal> =
                            series.iter().map(|x| (*x - m).abs()).collect();
                        mean(&deviations).map(Value::Number).unwrap_or(Value::Null)
                    }
                    None => Value::Null,
                }
            }
            Aggregation::MaxLength { column } => {
                let max = table
                    .column(column)?
                    .values_without_nulls()
                    .iter()
                    .map(|v| match v {
                        Value::Text(s) => s.chars().count(),
                        _ => 0,
                    })
                    .max()
                    .unwrap_or(0);
                Value::Number(Decimal::from(max))
            }
            Aggregation::MaxPrecision { column } => {
                let max = numeric_series(table, column)?
                    .iter()
                    .map(|d| d.normalize().scale())
                    .max()
                    .unwrap_or(0);
                Value::Number(Decimal::from(max))
            }
            Aggregation::HasNulls { column } => {
                Value::Boolean(table.column(column)?.has_nulls())
            }
            Aggregation::Any { column, test } => {
                Value::Boolean(table.column(column)?.iter().any(|v| test(v)))
            }
            Aggregation::All { column, test } => {
                Value::Boolean(table.column(column)?.iter().all(|v| test(v)))
            }
            Aggregation::Iqr { column } => {
                let series = sorted_numeric_series(table, column)?;
                if series.is_empty() {
                    Value::Null
                } else {
                    let q = Quantiles::percentiles(&series)?;
                    match (&q[75], &q[25]) {
                        (Value::Number(hi), Value::Number(lo)) => Value::Number(hi - lo),
                        _ => Value::Null,
                    }
                }
            }
            Aggregation::Percentiles { column } => {
                let series = sorted_numeric_series(table, column)?;
                return Ok(AggregateResult::Quantiles(Quantiles::percentiles(&series)?));
            }
            Aggregation::Quartiles { column } => {
                return quantile_subsample(table, column, 25);
            }
            Aggregation::Quintiles { column } => {
                return quantile_subsample(table, column, 20);
            }
            Aggregation::Deciles { column } => {
                return quantile_subsample(table, column, 10);
            }
            Aggregation::Custom { func, .. } => func(table)?,
        };
        Ok(AggregateResult::Value(value))
    }
}

fn quantile_subsample(table: &Table, column: &str, stride: usize) -> Result<AggregateResult> {
    let series = sorted_numeric_series(table, column)?;
    Ok(AggregateResult::Quantiles(
        Quantiles::percentiles(&series)?.subsample(stride),
    ))
}

fn warn_on_nulls(operation: &str, column: &Column) {
    if column.has_nulls() {
        log::warn!(
            "column {:?} contains nulls; they are excluded from the {} calculation",
            column.name(),
            operation
        );
    }
}

/// The non-null decimal values of a numeric column, in row order.
fn numeric_series(table: &Table, column: &str) -> Result<Vec<Decimal>> {
    let col = table.column(column)?;
    Ok(col
        .values_without_nulls()
        .iter()
        .filter_map(|v| v.as_number().copied())
        .collect())
}

/// The non-null decimal values of a numeric column, sorted ascending.
fn sorted_numeric_series(table: &Table, column: &str) -> Result<Vec<Decimal>> {
    let col = table.column(column)?;
    Ok(col
        .values_sorted()
        .iter()
        .filter_map(|v| v.as_number().copied())
        .collect())
}

fn mean(series: &[Decimal]) -> Option<Decimal> {
    if series.is_empty() {
        return None;
    }
    let sum: Decimal = series.iter().sum();
    Some(sum / Decimal::from(series.len()))
}

fn variance(series: &[Decimal], sample: bool) -> Option<Decimal> {
    let n = series.len();
    if n == 0 || (sample && n < 2) {
        return None;
    }
    let m = mean(series)?;
    let sum_squares: Decimal = series.iter().map(|x| (*x - m) * (*x - m)).sum();
    let divisor = if sample { n - 1 } else { n };
    Some(sum_squares / Decimal::from(divisor))
}

fn extremum(table: &Table, column: &str, keep: std::cmp::Ordering) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for value in table.column(column)?.values_without_nulls() {
        best = match best {
            None => Some(value),
            Some(current) => {
                if value.cmp_null_max(current) == keep {
                    Some(value)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

impl Table {
    /// Validate then run a single aggregation.
    pub fn aggregate(&self, aggregation: &Aggregation) -> Result<AggregateResult> {
        aggregation.validate(self)?;
        aggregation.run(self)
    }

    /// Validate every aggregation, then run every aggregation. The two
    /// passes are separate so one bad aggregation prevents any work.
    pub fn aggregate_all(
        &self,
        aggregations: &[(String, Aggregation)],
    ) -> Result<IndexMap<String, AggregateResult>> {
        for (_, aggregation) in aggregations {
            aggregation.validate(self)?;
        }
        let mut results = IndexMap::new();
        for (name, aggregation) in aggregations {
            results.insert(name.clone(), aggregation.run(self)?);
        }
        Ok(results)
    }
}
