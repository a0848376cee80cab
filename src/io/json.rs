//! JSON adapter
//!
//! Tables serialize as an array of objects, one object per row, keyed by
//! column name. Loading accepts the same shape; the union of keys across all
//! objects becomes the column list, and missing keys are nulls.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::model::table::{Table, TableOptions};

impl Table {
    /// Load a table from a JSON file holding an array of objects.
    pub fn from_json(path: impl AsRef<Path>, options: TableOptions) -> Result<Table> {
        let file = File::open(path)?;
        Self::from_json_reader(BufReader::new(file), options)
    }

    /// Load a table from any JSON source.
    pub fn from_json_reader<R: Read>(reader: R, options: TableOptions) -> Result<Table> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        let array = match value {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(Error::Cast {
                    value: other.to_string(),
                    data_type: "JSON array of objects".to_string(),
                })
            }
        };

        // union of keys across all objects, in first-appearance order
        let mut keys: IndexSet<String> = IndexSet::new();
        for item in &array {
            match item {
                serde_json::Value::Object(object) => {
                    for key in object.keys() {
                        keys.insert(key.clone());
                    }
                }
                other => {
                    return Err(Error::Cast {
                        value: other.to_string(),
                        data_type: "JSON object".to_string(),
                    })
                }
            }
        }

        let options = match options.column_names {
            Some(_) => options,
            None => {
                let names: Vec<String> = keys.iter().cloned().collect();
                options.with_column_names(names)
            }
        };
        let column_names = options
            .column_names
            .clone()
            .unwrap_or_default();

        let mut raw_rows = Vec::with_capacity(array.len());
        for item in &array {
            let object = match item {
                serde_json::Value::Object(object) => object,
                _ => unreachable!("checked above"),
            };
            let cells: Vec<Option<String>> = column_names
                .iter()
                .map(|key| object.get(key).and_then(json_cell))
                .collect();
            raw_rows.push(cells);
        }

        Table::new(raw_rows, options)
    }

    /// Write the table as an array of objects.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.to_json_writer(BufWriter::new(file))
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut array = Vec::with_capacity(self.n_rows());
        for row in self.rows().iter() {
            let mut object = serde_json::Map::with_capacity(self.n_columns());
            for (i, name) in self.column_names().iter().enumerate() {
                object.insert(name.clone(), self.column_types()[i].jsonify(&row[i]));
            }
            array.push(serde_json::Value::Object(object));
        }
        serde_json::to_writer_pretty(writer, &array)?;
        Ok(())
    }
}

/// The raw text of one JSON scalar, fed to the normal casting path. Numbers
/// keep their source digits exactly.
fn json_cell(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        // nested structures are carried as their JSON text
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TypeKind;
    use crate::model::value::Value;
    use rust_decimal::Decimal;

    const SAMPLE: &str = r#"[
        {"id": 1, "name": "alice", "score": 0.30000000000000004},
        {"id": 2, "name": "bob"},
        {"id": 3, "name": null, "score": 2.5}
    ]"#;

    #[test]
    fn test_from_json_union_of_keys() {
        let table = Table::from_json_reader(SAMPLE.as_bytes(), TableOptions::new()).unwrap();
        assert_eq!(
            table.column_names(),
            &["id".to_string(), "name".to_string(), "score".to_string()]
        );
        assert_eq!(table.n_rows(), 3);
        // a key absent from an object is null
        assert_eq!(table.row(1).unwrap()[2], Value::Null);
        assert_eq!(table.row(2).unwrap()[1], Value::Null);
    }

    #[test]
    fn test_json_numbers_keep_their_digits() {
        let table = Table::from_json_reader(SAMPLE.as_bytes(), TableOptions::new()).unwrap();
        assert_eq!(table.column_types()[2].kind(), TypeKind::Number);
        assert_eq!(
            table.row(0).unwrap()[2],
            Value::Number(Decimal::from_str_exact("0.30000000000000004").unwrap())
        );
    }

    #[test]
    fn test_non_array_input_is_an_error() {
        let result = Table::from_json_reader(r#"{"id": 1}"#.as_bytes(), TableOptions::new());
        assert!(matches!(result, Err(Error::Cast { .. })));
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let table = Table::from_json(&path, TableOptions::new()).unwrap();
        let out = dir.path().join("out.json");
        table.to_json(&out).unwrap();

        let again = Table::from_json(&out, TableOptions::new()).unwrap();
        assert_eq!(again.column_names(), table.column_names());
        for (a, b) in again.rows().iter().zip(table.rows().iter()) {
            assert_eq!(a.values(), b.values());
        }
    }
}
