//! Immutable table rows

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::value::Value;

/// An ordered sequence of already-cast values, keyed by column name.
///
/// Rows never mutate after construction, so tables produced by forking may
/// share `Arc<Row>` instances with their source instead of copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(column_names.len(), values.len());
        Self {
            column_names,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value under a column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.column_names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// Like [`get_by_name`](Self::get_by_name) but a missing column is a
    /// typed error.
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get_by_name(name)
            .ok_or_else(|| Error::ColumnDoesNotExist(name.to_string()))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Arc<Vec<String>> {
        Arc::new(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_access_by_index_and_name() {
        let row = Row::new(
            names(&["a", "b"]),
            vec![Value::from(1i64), Value::from("x")],
        );
        assert_eq!(row[0], Value::from(1i64));
        assert_eq!(row.get_by_name("b"), Some(&Value::from("x")));
        assert_eq!(row.get_by_name("c"), None);
        assert!(row.value("c").is_err());
    }
}
