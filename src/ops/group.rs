//! Grouping and pivoting

use std::sync::Arc;

use indexmap::IndexMap;

use crate::aggregate::Aggregation;
use crate::compute::Computation;
use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::tableset::TableSet;
use crate::model::types::ValueType;
use crate::model::value::Value;
use crate::ops::KeySpec;

/// Options for [`Table::pivot`].
#[derive(Debug, Default)]
pub struct PivotOptions {
    /// Spread this column's distinct values into output columns.
    pub pivot: Option<String>,
    /// Cell aggregation; defaults to a row count.
    pub aggregation: Option<(String, Aggregation)>,
    /// A computation applied to the aggregated table before spreading; its
    /// result becomes the cell value.
    pub computation: Option<(String, Computation)>,
    /// Fill for key/pivot combinations with no source rows.
    pub default_value: Option<Value>,
}

impl PivotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pivot(mut self, column: impl Into<String>) -> Self {
        self.pivot = Some(column.into());
        self
    }

    pub fn with_aggregation(mut self, name: impl Into<String>, aggregation: Aggregation) -> Self {
        self.aggregation = Some((name.into(), aggregation));
        self
    }

    pub fn with_computation(mut self, name: impl Into<String>, computation: Computation) -> Self {
        self.computation = Some((name.into(), computation));
        self
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

impl Table {
    /// Partition rows into a [`TableSet`] by a single column's value or a
    /// function of the row.
    ///
    /// Groups appear in first-occurrence order. When grouping by a column,
    /// the key name and type default to that column's; a function key
    /// defaults to the name "group" and the text type. Key values are cast
    /// through the key type, so grouping a text column by a number type
    /// coerces before partitioning. Member tables share row instances with
    /// this table.
    pub fn group_by(
        &self,
        key: &KeySpec,
        key_name: Option<&str>,
        key_type: Option<ValueType>,
    ) -> Result<TableSet> {
        if let Some(names) = key.column_names() {
            if names.len() > 1 {
                return Err(Error::DataType {
                    operation: "group_by".to_string(),
                    data_type: "multi-column key".to_string(),
                });
            }
        }
        let extractor = key.resolve(self)?;

        let column_name = key
            .column_names()
            .and_then(|names| names.first().cloned());
        let key_name = match (key_name, &column_name) {
            (Some(name), _) => name.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "group".to_string(),
        };
        let key_type = match (key_type, &column_name) {
            (Some(t), _) => t,
            (None, Some(name)) => self.column_types()[self.column_index(name)?].clone(),
            (None, None) => ValueType::text(),
        };

        let mut groups: IndexMap<Value, Vec<Arc<Row>>> = IndexMap::new();
        for row in self.rows().iter() {
            let group_key = key_type.cast_value(&extractor.extract_single(row))?;
            groups.entry(group_key).or_default().push(Arc::clone(row));
        }

        let members = groups
            .into_iter()
            .map(|(group_key, rows)| (group_key, self.fork(rows, None)))
            .collect();
        TableSet::new(members, key_name, key_type)
    }

    /// Summarize the table into one row per combination of key values,
    /// optionally spreading a pivot column's values into output columns.
    ///
    /// This is grouping, aggregation, and denormalization composed: the rows
    /// are grouped by each key in turn (and the pivot column last), each leaf
    /// group is reduced with the aggregation (a row count by default), and
    /// the pivot column, when present, is spread back into one column per
    /// distinct value. A computation, when given, runs on the aggregated
    /// table and its result becomes the spread value.
    pub fn pivot(&self, keys: &[&str], options: PivotOptions) -> Result<Table> {
        let mut group_columns: Vec<&str> = keys.to_vec();
        if let Some(pivot) = &options.pivot {
            group_columns.push(pivot.as_str());
        }
        if group_columns.is_empty() {
            return Err(Error::EmptyData {
                operation: "pivot".to_string(),
            });
        }

        let (agg_name, aggregation) = options
            .aggregation
            .unwrap_or_else(|| ("Count".to_string(), Aggregation::count()));

        let mut groups = self.group_by(&KeySpec::column(group_columns[0]), None, None)?;
        for column in &group_columns[1..] {
            groups = groups.group_by(&KeySpec::column(*column), None, None)?;
        }
        let mut table = groups.aggregate(&[(agg_name.clone(), aggregation)])?;

        let mut value_column = agg_name;
        if let Some((name, computation)) = options.computation {
            table = table.compute(&[(name.clone(), computation)])?;
            table = table.exclude(&[value_column.as_str()])?;
            value_column = name;
        }

        match &options.pivot {
            Some(pivot) => table.denormalize(
                Some(keys),
                pivot,
                &value_column,
                options.default_value,
            ),
            None => Ok(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tableset::TableSetMember;
    use crate::model::value::RowKey;
    use rust_decimal::Decimal;

    fn sales() -> Table {
        let rows = [
            ("east", "a", 1i64),
            ("east", "b", 2),
            ("west", "a", 3),
            ("east", "a", 4),
        ];
        Table::from_values(
            rows.iter()
                .map(|(r, p, n)| vec![Value::from(*r), Value::from(*p), Value::from(*n)])
                .collect(),
            vec![
                "region".to_string(),
                "product".to_string(),
                "units".to_string(),
            ],
            vec![ValueType::text(), ValueType::text(), ValueType::number()],
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_column_defaults() {
        let groups = sales().group_by(&KeySpec::column("region"), None, None).unwrap();
        assert_eq!(groups.key_name(), "region");
        // first-occurrence order
        assert_eq!(groups.keys(), &[Value::from("east"), Value::from("west")]);
        match groups.get(&Value::from("east")).unwrap() {
            TableSetMember::Table(t) => assert_eq!(t.n_rows(), 3),
            _ => panic!("expected a table member"),
        }
    }

    #[test]
    fn test_group_by_shares_rows() {
        let table = sales();
        let groups = table.group_by(&KeySpec::column("region"), None, None).unwrap();
        let east = match groups.get(&Value::from("east")).unwrap() {
            TableSetMember::Table(t) => Arc::clone(t),
            _ => panic!("expected a table member"),
        };
        assert!(Arc::ptr_eq(&east.rows()[0], &table.rows()[0]));
    }

    #[test]
    fn test_group_by_function_key() {
        let groups = sales()
            .group_by(
                &KeySpec::function(|row: &Row| {
                    Value::from(row[2].as_number().map_or(false, |n| *n > Decimal::from(2)))
                }),
                Some("big"),
                Some(ValueType::boolean()),
            )
            .unwrap();
        assert_eq!(groups.key_name(), "big");
        assert_eq!(groups.len(), 2);
        match groups.get(&Value::from(true)).unwrap() {
            TableSetMember::Table(t) => assert_eq!(t.n_rows(), 2),
            _ => panic!("expected a table member"),
        }
    }

    #[test]
    fn test_group_by_rejects_multi_column_key() {
        let result = sales().group_by(
            &KeySpec::columns(["region", "product"]),
            None,
            None,
        );
        assert!(matches!(result, Err(Error::DataType { .. })));
    }

    #[test]
    fn test_nested_aggregate_names_rows_by_key_tuple() {
        let groups = sales()
            .group_by(&KeySpec::column("region"), None, None)
            .unwrap()
            .group_by(&KeySpec::column("product"), None, None)
            .unwrap();
        let flat = groups
            .aggregate(&[("total".to_string(), Aggregation::sum("units"))])
            .unwrap();
        assert_eq!(
            flat.column_names(),
            &[
                "region".to_string(),
                "product".to_string(),
                "total".to_string()
            ]
        );
        // east: a, b; west: a
        assert_eq!(flat.n_rows(), 3);
        let row = flat
            .row_by_name(&RowKey::Tuple(vec![
                Value::from("east"),
                Value::from("a"),
            ]))
            .unwrap();
        assert_eq!(row[2], Value::from(5i64));
    }

    #[test]
    fn test_to_tables_flattens_nested_sets() {
        let groups = sales()
            .group_by(&KeySpec::column("region"), None, None)
            .unwrap()
            .group_by(&KeySpec::column("product"), None, None)
            .unwrap();
        let tables = groups.to_tables();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables.iter().map(|t| t.n_rows()).sum::<usize>(), 4);
    }

    #[test]
    fn test_pivot_counts() {
        let table = sales()
            .pivot(&["region"], PivotOptions::new().with_pivot("product"))
            .unwrap();
        assert_eq!(
            table.column_names(),
            &["region".to_string(), "a".to_string(), "b".to_string()]
        );
        let east = table
            .row_by_name(&RowKey::Single(Value::from("east")))
            .unwrap();
        assert_eq!(east[1], Value::from(2i64));
        assert_eq!(east[2], Value::from(1i64));
        // west never sold product b; counts default to zero
        let west = table
            .row_by_name(&RowKey::Single(Value::from("west")))
            .unwrap();
        assert_eq!(west[2], Value::from(0i64));
    }

    #[test]
    fn test_pivot_with_aggregation() {
        let table = sales()
            .pivot(
                &["region"],
                PivotOptions::new()
                    .with_pivot("product")
                    .with_aggregation("total", Aggregation::sum("units")),
            )
            .unwrap();
        let east = table
            .row_by_name(&RowKey::Single(Value::from("east")))
            .unwrap();
        assert_eq!(east[1], Value::from(5i64));
        assert_eq!(east[2], Value::from(2i64));
    }

    #[test]
    fn test_pivot_without_pivot_column() {
        let table = sales()
            .pivot(
                &["region"],
                PivotOptions::new().with_aggregation("total", Aggregation::sum("units")),
            )
            .unwrap();
        assert_eq!(
            table.column_names(),
            &["region".to_string(), "total".to_string()]
        );
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(1).unwrap()[1], Value::from(3i64));
    }
}
