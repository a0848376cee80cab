//! Hash join

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::types::ValueType;
use crate::model::value::Value;
use crate::ops::KeySpec;

/// Options for [`Table::join`].
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    /// Drop left rows with no right match instead of null-filling.
    pub inner: bool,
    /// Fail on the first left row with no right match.
    pub require_match: bool,
    /// Take exactly these right columns instead of "all but the key".
    pub columns: Option<Vec<String>>,
}

impl JoinOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }

    pub fn require_match(mut self) -> Self {
        self.require_match = true;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl Table {
    /// Join another table onto this one by key equality.
    ///
    /// The right table is indexed once by key value, keeping the full list of
    /// rows per key, so a left row matching N right rows emits N output rows.
    /// By default the join is a left outer join: unmatched left rows survive
    /// with the right-side columns null-filled. The right table's own key
    /// columns are omitted from the output unless requested explicitly via
    /// `columns`; name collisions with left columns are resolved by appending
    /// "2" to the right column's name.
    pub fn join(
        &self,
        right: &Table,
        left_key: &KeySpec,
        right_key: Option<&KeySpec>,
        options: JoinOptions,
    ) -> Result<Table> {
        let right_key = right_key.unwrap_or(left_key);
        let left_extract = left_key.resolve(self)?;
        let right_extract = right_key.resolve(right)?;

        // index the right table: key -> every matching row, in order
        let mut index: FxHashMap<Vec<Value>, Vec<usize>> = FxHashMap::default();
        for (i, row) in right.rows().iter().enumerate() {
            index.entry(right_extract.extract(row)).or_default().push(i);
        }

        // right columns carried into the output
        let right_indices: Vec<usize> = match &options.columns {
            Some(names) => {
                let indices: Result<Vec<usize>> =
                    names.iter().map(|n| right.column_index(n)).collect();
                indices?
            }
            None => {
                let key_columns = right_key.column_names().unwrap_or_default();
                (0..right.n_columns())
                    .filter(|&i| !key_columns.contains(&right.column_names()[i]))
                    .collect()
            }
        };

        let mut names: Vec<String> = self.column_names().to_vec();
        let mut types: Vec<ValueType> = self.column_types().to_vec();
        for &i in &right_indices {
            let mut name = right.column_names()[i].clone();
            while names.contains(&name) {
                name.push('2');
            }
            names.push(name);
            types.push(right.column_types()[i].clone());
        }
        let names = Arc::new(names);
        let types = Arc::new(types);

        let mut rows: Vec<Arc<Row>> = Vec::new();
        let mut row_names = self.row_names().map(|_| Vec::new());
        for (i, left_row) in self.rows().iter().enumerate() {
            let key = left_extract.extract(left_row);
            let matches = index.get(&key);
            match matches {
                Some(match_indices) => {
                    for &right_idx in match_indices {
                        let right_row = &right.rows()[right_idx];
                        let mut values = left_row.values().to_vec();
                        values.extend(right_indices.iter().map(|&c| right_row[c].clone()));
                        rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
                        if let (Some(out), Some(key)) =
                            (row_names.as_mut(), self.rows().key_at(i))
                        {
                            out.push(key.clone());
                        }
                    }
                }
                None => {
                    if options.require_match {
                        let parts: Vec<String> = key.iter().map(|v| v.display()).collect();
                        return Err(Error::UnmatchedKey(parts.join(", ")));
                    }
                    if options.inner {
                        continue;
                    }
                    let mut values = left_row.values().to_vec();
                    values.extend(right_indices.iter().map(|_| Value::Null));
                    rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
                    if let (Some(out), Some(key)) = (row_names.as_mut(), self.rows().key_at(i)) {
                        out.push(key.clone());
                    }
                }
            }
        }

        Ok(Table::with_schema(names, types, rows, row_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ValueType;

    fn left() -> Table {
        Table::from_values(
            vec![
                vec![Value::from(1i64), Value::from("one")],
                vec![Value::from(2i64), Value::from("two")],
                vec![Value::from(3i64), Value::from("three")],
            ],
            vec!["id".to_string(), "name".to_string()],
            vec![ValueType::number(), ValueType::text()],
        )
        .unwrap()
    }

    fn right() -> Table {
        Table::from_values(
            vec![
                vec![Value::from(1i64), Value::from("a")],
                vec![Value::from(1i64), Value::from("b")],
                vec![Value::from(2i64), Value::from("c")],
            ],
            vec!["id".to_string(), "tag".to_string()],
            vec![ValueType::number(), ValueType::text()],
        )
        .unwrap()
    }

    #[test]
    fn test_outer_join_cardinality() {
        let joined = left()
            .join(&right(), &KeySpec::column("id"), None, JoinOptions::new())
            .unwrap();
        // id=1 matches twice, id=2 once, id=3 unmatched but kept
        assert_eq!(joined.n_rows(), 4);
        assert_eq!(
            joined.column_names(),
            &["id".to_string(), "name".to_string(), "tag".to_string()]
        );
        assert_eq!(joined.row(0).unwrap()[2], Value::from("a"));
        assert_eq!(joined.row(1).unwrap()[2], Value::from("b"));
        assert_eq!(joined.row(3).unwrap()[2], Value::Null);
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let joined = left()
            .join(
                &right(),
                &KeySpec::column("id"),
                None,
                JoinOptions::new().inner(),
            )
            .unwrap();
        assert_eq!(joined.n_rows(), 3);
        assert!(joined
            .rows()
            .iter()
            .all(|r| r[0] != Value::from(3i64)));
    }

    #[test]
    fn test_require_match_fails_on_gap() {
        let result = left().join(
            &right(),
            &KeySpec::column("id"),
            None,
            JoinOptions::new().require_match(),
        );
        assert!(matches!(result, Err(Error::UnmatchedKey(_))));
    }

    #[test]
    fn test_explicit_right_columns_and_collision_suffix() {
        let joined = left()
            .join(
                &right(),
                &KeySpec::column("id"),
                None,
                JoinOptions::new().with_columns(["id", "tag"]),
            )
            .unwrap();
        assert_eq!(
            joined.column_names(),
            &[
                "id".to_string(),
                "name".to_string(),
                "id2".to_string(),
                "tag".to_string()
            ]
        );
    }

    #[test]
    fn test_join_does_not_mutate_inputs() {
        let l = left();
        let r = right();
        let _ = l
            .join(&r, &KeySpec::column("id"), None, JoinOptions::new())
            .unwrap();
        assert_eq!(l.n_rows(), 3);
        assert_eq!(l.n_columns(), 2);
        assert_eq!(r.n_rows(), 3);
    }

    #[test]
    fn test_join_on_function_keys() {
        let l = left();
        let r = right();
        let key = KeySpec::function(|row: &Row| row[0].clone());
        let joined = l
            .join(&r, &key, Some(&key), JoinOptions::new().inner())
            .unwrap();
        // function keys exclude nothing from the right side
        assert_eq!(joined.n_columns(), 4);
        assert_eq!(joined.n_rows(), 3);
    }
}
