//! Reshaping between long and wide layouts

use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::types::{TypeKind, ValueType};
use crate::model::value::{RowKey, Value};

impl Table {
    /// Convert wide data to long: one output row per (input row, property).
    ///
    /// Each property column contributes a row holding the key values, the
    /// property's name, and its value. When the property columns share one
    /// type kind the value column keeps it; mixed kinds fall back to text,
    /// with each value rendered through its own column type.
    pub fn normalize(
        &self,
        key: &[&str],
        properties: &[&str],
        property_column: Option<&str>,
        value_column: Option<&str>,
    ) -> Result<Table> {
        let property_column = property_column.unwrap_or("property");
        let value_column = value_column.unwrap_or("value");
        if properties.is_empty() {
            return Err(Error::EmptyData {
                operation: "normalize".to_string(),
            });
        }

        let key_indices: Vec<usize> = key
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<_>>()?;
        let property_indices: Vec<usize> = properties
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<_>>()?;

        let first_kind = self.column_types()[property_indices[0]].kind();
        let uniform = property_indices
            .iter()
            .all(|&i| self.column_types()[i].kind() == first_kind);
        let value_type = if uniform {
            self.column_types()[property_indices[0]].clone()
        } else {
            ValueType::text()
        };

        let mut names: Vec<String> = key_indices
            .iter()
            .map(|&i| self.column_names()[i].clone())
            .collect();
        names.push(property_column.to_string());
        names.push(value_column.to_string());
        let mut types: Vec<ValueType> = key_indices
            .iter()
            .map(|&i| self.column_types()[i].clone())
            .collect();
        types.push(ValueType::text());
        types.push(value_type.clone());

        let names = Arc::new(names);
        let types = Arc::new(types);
        let mut rows = Vec::with_capacity(self.n_rows() * properties.len());
        for row in self.rows().iter() {
            for (&prop_idx, prop_name) in property_indices.iter().zip(properties.iter()) {
                let mut values: Vec<Value> =
                    key_indices.iter().map(|&i| row[i].clone()).collect();
                values.push(Value::Text(prop_name.to_string()));
                let cell = &row[prop_idx];
                let value = if uniform || cell.is_null() {
                    cell.clone()
                } else {
                    Value::Text(self.column_types()[prop_idx].csvify(cell))
                };
                values.push(value);
                rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
            }
        }

        Ok(Table::with_schema(names, types, rows, None))
    }

    /// Convert long data to wide: the property column's distinct values
    /// become output columns.
    ///
    /// Rows sharing key values collapse into one output row, with the value
    /// from each property landing in its column (last occurrence wins).
    /// Combinations never seen in the input are filled with `default_value`,
    /// or zero for a numeric value column and null otherwise. With no key
    /// the whole table collapses to a single row. The keys become the output
    /// row names.
    pub fn denormalize(
        &self,
        key: Option<&[&str]>,
        property_column: &str,
        value_column: &str,
        default_value: Option<Value>,
    ) -> Result<Table> {
        let key = key.unwrap_or(&[]);
        let key_indices: Vec<usize> = key
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<_>>()?;
        let property_idx = self.column_index(property_column)?;
        let value_idx = self.column_index(value_column)?;
        let value_type = self.column_types()[value_idx].clone();

        let fill = match default_value {
            Some(v) => value_type.cast_value(&v)?,
            None if value_type.kind() == TypeKind::Number => Value::Number(Decimal::ZERO),
            None => Value::Null,
        };

        // distinct property values become columns, in first-occurrence order
        let mut fields: Vec<String> = Vec::new();
        // key tuple -> field name -> value
        let mut groups: IndexMap<Vec<Value>, IndexMap<String, Value>> = IndexMap::new();
        for row in self.rows().iter() {
            let field = row[property_idx].display();
            if !fields.contains(&field) {
                fields.push(field.clone());
            }
            let group_key: Vec<Value> = key_indices.iter().map(|&i| row[i].clone()).collect();
            groups
                .entry(group_key)
                .or_default()
                .insert(field, row[value_idx].clone());
        }

        let mut names: Vec<String> = key_indices
            .iter()
            .map(|&i| self.column_names()[i].clone())
            .collect();
        let mut types: Vec<ValueType> = key_indices
            .iter()
            .map(|&i| self.column_types()[i].clone())
            .collect();
        for field in &fields {
            let mut name = field.clone();
            while names.contains(&name) {
                name.push('2');
            }
            names.push(name);
            types.push(value_type.clone());
        }

        let names = Arc::new(names);
        let types = Arc::new(types);
        let mut rows = Vec::with_capacity(groups.len());
        let mut row_names = Vec::with_capacity(groups.len());
        for (group_key, cells) in &groups {
            let mut values = group_key.clone();
            for field in &fields {
                values.push(cells.get(field).cloned().unwrap_or_else(|| fill.clone()));
            }
            rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
            row_names.push(match group_key.as_slice() {
                [single] => RowKey::Single(single.clone()),
                _ => RowKey::Tuple(group_key.clone()),
            });
        }

        let row_names = if key_indices.is_empty() {
            None
        } else {
            Some(row_names)
        };
        Ok(Table::with_schema(names, types, rows, row_names))
    }
}
