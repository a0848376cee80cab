//! Relational operators on [`Table`]
//!
//! All operators are pure: none of them mutate `self`, each returns a newly
//! constructed table (or table set). Row order is preserved by every operator
//! except `order_by`, and `join`/`group_by`/`pivot` which define their own
//! deterministic first-occurrence orders.

mod filter;
mod group;
mod join;
mod reshape;

pub use group::PivotOptions;
pub use join::JoinOptions;

use std::sync::Arc;

use crate::error::Result;
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::value::Value;

/// A row-to-values function used for derived keys.
pub type KeyFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// How a "key" parameter selects values from a row: a single column, a
/// sequence of columns (lexicographic tuple comparison), or a derived
/// function.
#[derive(Clone)]
pub enum KeySpec {
    Column(String),
    Columns(Vec<String>),
    Function(KeyFn),
}

impl std::fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySpec::Column(name) => f.debug_tuple("Column").field(name).finish(),
            KeySpec::Columns(names) => f.debug_tuple("Columns").field(names).finish(),
            KeySpec::Function(_) => f.debug_tuple("Function").field(&"<fn>").finish(),
        }
    }
}

impl KeySpec {
    pub fn column(name: impl Into<String>) -> Self {
        KeySpec::Column(name.into())
    }

    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySpec::Columns(names.into_iter().map(Into::into).collect())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        KeySpec::Function(Arc::new(f))
    }

    /// The column names this key reads, when it is column-based.
    pub fn column_names(&self) -> Option<Vec<String>> {
        match self {
            KeySpec::Column(name) => Some(vec![name.clone()]),
            KeySpec::Columns(names) => Some(names.clone()),
            KeySpec::Function(_) => None,
        }
    }

    /// Resolve the key against a table's schema once, producing a concrete
    /// per-row extraction closure. Column lookups fail here, not per row.
    pub(crate) fn resolve(&self, table: &Table) -> Result<KeyExtractor> {
        match self {
            KeySpec::Column(name) => {
                let idx = table.column_index(name)?;
                Ok(KeyExtractor::Indices(vec![idx]))
            }
            KeySpec::Columns(names) => {
                let indices: Result<Vec<usize>> =
                    names.iter().map(|n| table.column_index(n)).collect();
                Ok(KeyExtractor::Indices(indices?))
            }
            KeySpec::Function(f) => Ok(KeyExtractor::Function(Arc::clone(f))),
        }
    }
}

impl From<&str> for KeySpec {
    fn from(name: &str) -> Self {
        KeySpec::Column(name.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(name: String) -> Self {
        KeySpec::Column(name)
    }
}

/// A resolved key: extracts the comparison/grouping values from a row.
pub(crate) enum KeyExtractor {
    Indices(Vec<usize>),
    Function(KeyFn),
}

impl KeyExtractor {
    /// The key values for one row, as a tuple.
    pub(crate) fn extract(&self, row: &Row) -> Vec<Value> {
        match self {
            KeyExtractor::Indices(indices) => {
                indices.iter().map(|&i| row[i].clone()).collect()
            }
            KeyExtractor::Function(f) => vec![f(row)],
        }
    }

    /// The key value for one row when the key is known to be single-valued.
    pub(crate) fn extract_single(&self, row: &Row) -> Value {
        match self {
            KeyExtractor::Indices(indices) => indices
                .first()
                .map(|&i| row[i].clone())
                .unwrap_or(Value::Null),
            KeyExtractor::Function(f) => f(row),
        }
    }
}
