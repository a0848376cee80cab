//! Cached per-column views

use std::sync::OnceLock;

use crate::model::types::ValueType;
use crate::model::value::Value;

/// A view of one field across all rows of a table.
///
/// Not an independent entity: a column is materialized lazily by its owning
/// table and cached for that table's lifetime. The null-stripped and sorted
/// variants are themselves computed once on first use; this is safe without
/// locking beyond `OnceLock` because the owning table never mutates.
#[derive(Debug)]
pub struct Column {
    name: String,
    data_type: ValueType,
    values: Vec<Value>,
    without_nulls: OnceLock<Vec<Value>>,
    sorted: OnceLock<Vec<Value>>,
}

impl Column {
    pub fn new(name: String, data_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            name,
            data_type,
            values,
            without_nulls: OnceLock::new(),
            sorted: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &ValueType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The column's values with nulls removed, in row order.
    pub fn values_without_nulls(&self) -> &[Value] {
        self.without_nulls
            .get_or_init(|| self.values.iter().filter(|v| !v.is_null()).cloned().collect())
    }

    /// The column's non-null values sorted ascending. Input to the quantile
    /// engine and rank computations.
    pub fn values_sorted(&self) -> &[Value] {
        self.sorted.get_or_init(|| {
            let mut sorted: Vec<Value> = self.values_without_nulls().to_vec();
            sorted.sort_by(|a, b| a.cmp_null_max(b));
            sorted
        })
    }

    /// Whether any value in the column is null.
    pub fn has_nulls(&self) -> bool {
        self.values.iter().any(|v| v.is_null())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}
