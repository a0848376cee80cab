//! The central immutable table

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::column::Column;
use crate::model::row::Row;
use crate::model::sequence::KeyedSequence;
use crate::model::types::{TypeTester, ValueType};
use crate::model::value::{RowKey, Value};

/// How column types are supplied at construction.
#[derive(Debug, Clone, Default)]
pub enum TypeSpec {
    /// Run the default [`TypeTester`] over all rows.
    #[default]
    Infer,
    /// One explicit type per column, in column order.
    Full(Vec<ValueType>),
    /// Per-column overrides; remaining columns are inferred.
    Overrides(IndexMap<String, ValueType>),
    /// A fully configured tester (custom candidates, sample limit, forcing).
    Tester(TypeTester),
}

/// How row names are supplied at construction.
#[derive(Debug, Clone, Default)]
pub enum RowNameSpec {
    #[default]
    None,
    /// Use the (cast) values of the named column.
    ByColumn(String),
    /// One explicit name per row.
    Explicit(Vec<RowKey>),
}

/// Options for [`Table::new`].
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    pub column_names: Option<Vec<String>>,
    pub column_types: TypeSpec,
    pub row_names: RowNameSpec,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    pub fn with_column_types(mut self, types: Vec<ValueType>) -> Self {
        self.column_types = TypeSpec::Full(types);
        self
    }

    pub fn with_type_overrides(mut self, overrides: IndexMap<String, ValueType>) -> Self {
        self.column_types = TypeSpec::Overrides(overrides);
        self
    }

    pub fn with_tester(mut self, tester: TypeTester) -> Self {
        self.column_types = TypeSpec::Tester(tester);
        self
    }

    pub fn with_row_names(mut self, names: Vec<RowKey>) -> Self {
        self.row_names = RowNameSpec::Explicit(names);
        self
    }

    pub fn with_row_names_from(mut self, column: impl Into<String>) -> Self {
        self.row_names = RowNameSpec::ByColumn(column.into());
        self
    }
}

/// An immutable table: column names, one value type per column, and rows of
/// already-cast values.
///
/// Every operator that "changes" data constructs and returns a new table; a
/// forked table shares `Arc<Row>` instances with its source whenever the row
/// data is unchanged.
#[derive(Debug, Clone)]
pub struct Table {
    column_names: Arc<Vec<String>>,
    column_types: Arc<Vec<ValueType>>,
    rows: KeyedSequence<RowKey, Arc<Row>>,
    columns: OnceLock<Vec<Arc<Column>>>,
}

impl Table {
    /// Build a table from raw text rows.
    ///
    /// Missing column names are auto-assigned spreadsheet-style letter names
    /// (with a warning); missing column types trigger inference. Rows
    /// shorter than the header are padded with nulls; longer rows are an
    /// error.
    pub fn new(raw_rows: Vec<Vec<Option<String>>>, options: TableOptions) -> Result<Table> {
        let width = options
            .column_names
            .as_ref()
            .map(|n| n.len())
            .or_else(|| raw_rows.iter().map(|r| r.len()).max())
            .unwrap_or(0);

        let column_names = match options.column_names {
            Some(names) => names,
            None => {
                log::warn!("no column names supplied, assigning letter names");
                (0..width).map(letter_name).collect()
            }
        };
        check_unique(&column_names)?;

        let column_types = match options.column_types {
            TypeSpec::Full(types) => {
                if types.len() != column_names.len() {
                    return Err(Error::ColumnCountMismatch {
                        row: 0,
                        expected: column_names.len(),
                        actual: types.len(),
                    });
                }
                types
            }
            TypeSpec::Infer => TypeTester::new().run(&raw_rows, &column_names),
            TypeSpec::Overrides(force) => TypeTester::new()
                .with_force(force)
                .run(&raw_rows, &column_names),
            TypeSpec::Tester(tester) => tester.run(&raw_rows, &column_names),
        };

        let names = Arc::new(column_names);
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (row_idx, raw) in raw_rows.into_iter().enumerate() {
            if raw.len() > names.len() {
                return Err(Error::ColumnCountMismatch {
                    row: row_idx,
                    expected: names.len(),
                    actual: raw.len(),
                });
            }
            let mut values = Vec::with_capacity(names.len());
            for (col, data_type) in column_types.iter().enumerate() {
                let cell = raw.get(col).and_then(|c| c.as_deref());
                values.push(data_type.cast(cell)?);
            }
            rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
        }

        Self::assemble(names, Arc::new(column_types), rows, options.row_names)
    }

    /// Build a table from already-typed values. Every cell is still passed
    /// through its column type for validation.
    pub fn from_values(
        rows: Vec<Vec<Value>>,
        column_names: Vec<String>,
        column_types: Vec<ValueType>,
    ) -> Result<Table> {
        Self::from_values_named(rows, column_names, column_types, RowNameSpec::None)
    }

    /// [`from_values`](Self::from_values) with row names.
    pub fn from_values_named(
        rows: Vec<Vec<Value>>,
        column_names: Vec<String>,
        column_types: Vec<ValueType>,
        row_names: RowNameSpec,
    ) -> Result<Table> {
        check_unique(&column_names)?;
        if column_types.len() != column_names.len() {
            return Err(Error::ColumnCountMismatch {
                row: 0,
                expected: column_names.len(),
                actual: column_types.len(),
            });
        }
        let names = Arc::new(column_names);
        let mut cast_rows = Vec::with_capacity(rows.len());
        for (row_idx, values) in rows.into_iter().enumerate() {
            if values.len() != names.len() {
                return Err(Error::ColumnCountMismatch {
                    row: row_idx,
                    expected: names.len(),
                    actual: values.len(),
                });
            }
            let cast: Result<Vec<Value>> = values
                .iter()
                .zip(column_types.iter())
                .map(|(v, t)| t.cast_value(v))
                .collect();
            cast_rows.push(Arc::new(Row::new(Arc::clone(&names), cast?)));
        }
        Self::assemble(names, Arc::new(column_types), cast_rows, row_names)
    }

    fn assemble(
        column_names: Arc<Vec<String>>,
        column_types: Arc<Vec<ValueType>>,
        rows: Vec<Arc<Row>>,
        row_names: RowNameSpec,
    ) -> Result<Table> {
        let rows = match row_names {
            RowNameSpec::None => KeyedSequence::new(rows),
            RowNameSpec::Explicit(keys) => {
                if keys.len() != rows.len() {
                    return Err(Error::RowNameCountMismatch {
                        expected: rows.len(),
                        actual: keys.len(),
                    });
                }
                KeyedSequence::with_keys(rows, keys)
            }
            RowNameSpec::ByColumn(name) => {
                let idx = column_names
                    .iter()
                    .position(|n| *n == name)
                    .ok_or_else(|| Error::ColumnDoesNotExist(name.clone()))?;
                let keys: Vec<RowKey> = rows
                    .iter()
                    .map(|r| RowKey::Single(r[idx].clone()))
                    .collect();
                KeyedSequence::with_keys(rows, keys)
            }
        };
        Ok(Table {
            column_names,
            column_types,
            rows,
            columns: OnceLock::new(),
        })
    }

    /// Construct a new table sharing this table's schema and the given rows.
    ///
    /// The fork never copies row data; callers pass through the source's
    /// `Arc<Row>`s (or newly assembled rows) directly.
    pub(crate) fn fork(&self, rows: Vec<Arc<Row>>, row_names: Option<Vec<RowKey>>) -> Table {
        Table {
            column_names: Arc::clone(&self.column_names),
            column_types: Arc::clone(&self.column_types),
            rows: match row_names {
                Some(keys) => KeyedSequence::with_keys(rows, keys),
                None => KeyedSequence::new(rows),
            },
            columns: OnceLock::new(),
        }
    }

    /// Construct a table with a different schema from pre-built rows.
    pub(crate) fn with_schema(
        column_names: Arc<Vec<String>>,
        column_types: Arc<Vec<ValueType>>,
        rows: Vec<Arc<Row>>,
        row_names: Option<Vec<RowKey>>,
    ) -> Table {
        Table {
            column_names,
            column_types,
            rows: match row_names {
                Some(keys) => KeyedSequence::with_keys(rows, keys),
                None => KeyedSequence::new(rows),
            },
            columns: OnceLock::new(),
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_types(&self) -> &[ValueType] {
        &self.column_types
    }

    pub fn rows(&self) -> &KeyedSequence<RowKey, Arc<Row>> {
        &self.rows
    }

    /// Row names in row order, if the table has them.
    pub fn row_names(&self) -> Option<&[RowKey]> {
        self.rows.keys()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Row by position.
    pub fn row(&self, index: usize) -> Result<&Arc<Row>> {
        self.rows
            .get(index)
            .ok_or_else(|| Error::RowDoesNotExist(index.to_string()))
    }

    /// Row by name.
    pub fn row_by_name(&self, name: &RowKey) -> Result<&Arc<Row>> {
        self.rows
            .get_by_key(name)
            .ok_or_else(|| Error::RowDoesNotExist(name.display()))
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.column_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::ColumnDoesNotExist(name.to_string()))
    }

    /// All columns, materialized on first access and cached for the life of
    /// this table. Forks recompute their own columns.
    pub fn columns(&self) -> &[Arc<Column>] {
        self.columns.get_or_init(|| {
            self.column_names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let values: Vec<Value> =
                        self.rows.iter().map(|row| row[i].clone()).collect();
                    Arc::new(Column::new(
                        name.clone(),
                        self.column_types[i].clone(),
                        values,
                    ))
                })
                .collect()
        })
    }

    /// A single column by name.
    pub fn column(&self, name: &str) -> Result<&Arc<Column>> {
        let idx = self.column_index(name)?;
        Ok(&self.columns()[idx])
    }
}

fn check_unique(names: &[String]) -> Result<()> {
    let mut seen = rustc_hash::FxHashSet::default();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(Error::DuplicateColumnName(name.clone()));
        }
    }
    Ok(())
}

/// Spreadsheet-style letter name for a zero-based column index: A, B, … Z,
/// AA, AB, …
fn letter_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}
