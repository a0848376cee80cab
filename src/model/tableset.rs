//! Keyed collections of schema-identical tables

use std::sync::Arc;

use crate::aggregate::Aggregation;
use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::sequence::KeyedSequence;
use crate::model::table::Table;
use crate::model::types::ValueType;
use crate::model::value::{RowKey, Value};
use crate::ops::KeySpec;

/// A member of a table set: a table, or a nested set produced by chained
/// grouping.
#[derive(Debug, Clone)]
pub enum TableSetMember {
    Table(Arc<Table>),
    Set(Arc<TableSet>),
}

impl TableSetMember {
    fn column_names(&self) -> &[String] {
        match self {
            TableSetMember::Table(t) => t.column_names(),
            TableSetMember::Set(s) => s.column_names(),
        }
    }

    fn column_types(&self) -> &[ValueType] {
        match self {
            TableSetMember::Table(t) => t.column_types(),
            TableSetMember::Set(s) => s.column_types(),
        }
    }
}

/// An ordered mapping from a grouping-key value to a table (or, for chained
/// groupings, a nested table set).
///
/// Every member shares identical column names and structurally equal column
/// types; a mismatch at construction is a fatal configuration error. The
/// shared schema is kept on the set itself so an empty set still knows its
/// shape.
#[derive(Debug, Clone)]
pub struct TableSet {
    members: KeyedSequence<Value, TableSetMember>,
    key_name: String,
    key_type: ValueType,
    column_names: Arc<Vec<String>>,
    column_types: Arc<Vec<ValueType>>,
}

impl TableSet {
    /// Build a set from keyed tables. The first member's schema becomes the
    /// set schema; every other member must match it.
    pub fn new(
        members: Vec<(Value, Table)>,
        key_name: impl Into<String>,
        key_type: ValueType,
    ) -> Result<TableSet> {
        let members = members
            .into_iter()
            .map(|(k, t)| (k, TableSetMember::Table(Arc::new(t))))
            .collect();
        Self::from_members(members, key_name.into(), key_type)
    }

    pub(crate) fn from_members(
        members: Vec<(Value, TableSetMember)>,
        key_name: String,
        key_type: ValueType,
    ) -> Result<TableSet> {
        let (column_names, column_types) = match members.first() {
            Some((_, member)) => (
                Arc::new(member.column_names().to_vec()),
                Arc::new(member.column_types().to_vec()),
            ),
            None => (Arc::new(Vec::new()), Arc::new(Vec::new())),
        };

        for (key, member) in &members {
            if member.column_names() != column_names.as_slice() {
                return Err(Error::SchemaMismatch {
                    key: key.display(),
                    reason: "column names differ".to_string(),
                });
            }
            let kinds_match = member
                .column_types()
                .iter()
                .zip(column_types.iter())
                .all(|(a, b)| a.kind() == b.kind());
            if !kinds_match || member.column_types().len() != column_types.len() {
                return Err(Error::SchemaMismatch {
                    key: key.display(),
                    reason: "column types differ".to_string(),
                });
            }
            // tables and nested sets cannot be mixed in one set
            if std::mem::discriminant(member)
                != std::mem::discriminant(&members[0].1)
            {
                return Err(Error::SchemaMismatch {
                    key: key.display(),
                    reason: "mixed tables and nested sets".to_string(),
                });
            }
        }

        let (keys, items): (Vec<Value>, Vec<TableSetMember>) = members.into_iter().unzip();
        Ok(TableSet {
            members: KeyedSequence::with_keys(items, keys),
            key_name,
            key_type,
            column_names,
            column_types,
        })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_type(&self) -> &ValueType {
        &self.key_type
    }

    /// Column names shared by every member.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Column types shared (by kind) by every member.
    pub fn column_types(&self) -> &[ValueType] {
        &self.column_types
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keys(&self) -> &[Value] {
        self.members.keys().unwrap_or(&[])
    }

    pub fn get(&self, key: &Value) -> Option<&TableSetMember> {
        self.members.get_by_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &TableSetMember)> {
        self.members.iter_keyed()
    }

    /// The leaf tables in member order, recursing through nested sets.
    pub fn to_tables(&self) -> Vec<Arc<Table>> {
        let mut tables = Vec::with_capacity(self.len());
        for (_, member) in self.iter() {
            match member {
                TableSetMember::Table(t) => tables.push(Arc::clone(t)),
                TableSetMember::Set(s) => tables.extend(s.to_tables()),
            }
        }
        tables
    }

    /// Apply a table-to-table operation to every member, recursing through
    /// nested sets. The member keys and grouping metadata are preserved.
    pub fn map_tables<F>(&self, f: &F) -> Result<TableSet>
    where
        F: Fn(&Table) -> Result<Table>,
    {
        let mut members = Vec::with_capacity(self.len());
        for (key, member) in self.iter() {
            let mapped = match member {
                TableSetMember::Table(t) => TableSetMember::Table(Arc::new(f(t)?)),
                TableSetMember::Set(s) => TableSetMember::Set(Arc::new(s.map_tables(f)?)),
            };
            members.push((key.clone(), mapped));
        }
        Self::from_members(members, self.key_name.clone(), self.key_type.clone())
    }

    /// Member-wise [`Table::select`].
    pub fn select(&self, names: &[&str]) -> Result<TableSet> {
        self.map_tables(&|t| t.select(names))
    }

    /// Member-wise [`Table::exclude`].
    pub fn exclude(&self, names: &[&str]) -> Result<TableSet> {
        self.map_tables(&|t| t.exclude(names))
    }

    /// Member-wise [`Table::filter`].
    pub fn filter<P>(&self, predicate: P) -> Result<TableSet>
    where
        P: Fn(&Row) -> bool,
    {
        self.map_tables(&|t| Ok(t.filter(&predicate)))
    }

    /// Member-wise [`Table::order_by`].
    pub fn order_by(&self, key: &KeySpec, reverse: bool) -> Result<TableSet> {
        self.map_tables(&|t| t.order_by(key, reverse))
    }

    /// Member-wise [`Table::limit`].
    pub fn limit(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    ) -> Result<TableSet> {
        self.map_tables(&|t| t.limit(start, stop, step))
    }

    /// Member-wise [`Table::distinct`].
    pub fn distinct(&self, key: Option<&KeySpec>) -> Result<TableSet> {
        self.map_tables(&|t| t.distinct(key))
    }

    /// Member-wise [`Table::compute`].
    pub fn compute(
        &self,
        computations: &[(String, crate::compute::Computation)],
    ) -> Result<TableSet> {
        self.map_tables(&|t| t.compute(computations))
    }

    /// Group every member table again, producing a set of nested sets.
    pub fn group_by(
        &self,
        key: &KeySpec,
        key_name: Option<&str>,
        key_type: Option<ValueType>,
    ) -> Result<TableSet> {
        let mut members = Vec::with_capacity(self.len());
        for (outer_key, member) in self.iter() {
            let nested = match member {
                TableSetMember::Table(t) => t.group_by(key, key_name, key_type.clone())?,
                TableSetMember::Set(s) => s.group_by(key, key_name, key_type.clone())?,
            };
            members.push((outer_key.clone(), TableSetMember::Set(Arc::new(nested))));
        }
        Self::from_members(members, self.key_name.clone(), self.key_type.clone())
    }

    /// An empty table with the members' schema, used to resolve aggregation
    /// result types even when the set has no members.
    fn sample_table(&self) -> Table {
        Table::with_schema(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_types),
            Vec::new(),
            None,
        )
    }

    /// Flatten the set into a single table with one row per leaf member.
    ///
    /// Each aggregation becomes one column (named by the caller), prefixed by
    /// one key column per grouping level. Nested sets aggregate recursively:
    /// the outer key value is prepended to every row the inner set produces,
    /// and the row names become the tuple of all grouping-key values.
    pub fn aggregate(&self, aggregations: &[(String, Aggregation)]) -> Result<Table> {
        // resolve result types and validate every member before running
        // anything; Percentiles and friends fail here
        let sample = self.sample_table();
        let mut agg_types = Vec::with_capacity(aggregations.len());
        for (_, aggregation) in aggregations {
            agg_types.push(aggregation.aggregate_data_type(&sample)?);
        }
        self.validate_members(aggregations)?;
        self.aggregate_unchecked(aggregations, &agg_types)
    }

    fn validate_members(&self, aggregations: &[(String, Aggregation)]) -> Result<()> {
        for (_, member) in self.iter() {
            match member {
                TableSetMember::Table(t) => {
                    for (_, aggregation) in aggregations {
                        aggregation.validate(t)?;
                    }
                }
                TableSetMember::Set(s) => s.validate_members(aggregations)?,
            }
        }
        Ok(())
    }

    fn aggregate_unchecked(
        &self,
        aggregations: &[(String, Aggregation)],
        agg_types: &[ValueType],
    ) -> Result<Table> {
        let mut names = vec![self.key_name.clone()];
        let mut types = vec![self.key_type.clone()];

        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut row_names: Vec<RowKey> = Vec::new();
        let mut inner_columns: Option<(Vec<String>, Vec<ValueType>)> = None;

        for (key, member) in self.iter() {
            match member {
                TableSetMember::Table(t) => {
                    let mut values = vec![key.clone()];
                    for (_, aggregation) in aggregations {
                        values.push(aggregation.run(t)?.into_value()?);
                    }
                    rows.push(values);
                    row_names.push(RowKey::Single(key.clone()));
                }
                TableSetMember::Set(s) => {
                    let inner = s.aggregate_unchecked(aggregations, agg_types)?;
                    if inner_columns.is_none() {
                        inner_columns = Some((
                            inner.column_names().to_vec(),
                            inner.column_types().to_vec(),
                        ));
                    }
                    let inner_names = inner.row_names().unwrap_or(&[]);
                    for (i, row) in inner.rows().iter().enumerate() {
                        let mut values = vec![key.clone()];
                        values.extend(row.values().iter().cloned());
                        rows.push(values);
                        let inner_key = inner_names
                            .get(i)
                            .cloned()
                            .unwrap_or(RowKey::Single(Value::Null));
                        row_names.push(inner_key.prepend(key.clone()));
                    }
                }
            }
        }

        match inner_columns {
            Some((inner_names, inner_types)) => {
                names.extend(inner_names);
                types.extend(inner_types);
            }
            None => {
                for ((agg_name, _), agg_type) in aggregations.iter().zip(agg_types.iter()) {
                    names.push(agg_name.clone());
                    types.push(agg_type.clone());
                }
            }
        }

        let names = Arc::new(names);
        let types = Arc::new(types);
        let rows: Vec<Arc<Row>> = rows
            .into_iter()
            .map(|values| Arc::new(Row::new(Arc::clone(&names), values)))
            .collect();
        Ok(Table::with_schema(names, types, rows, Some(row_names)))
    }

    /// Concatenate every member back into one table, prefixing a column
    /// holding the grouping-key value. Nested sets are merged first, so each
    /// grouping level contributes one column.
    pub fn merge(&self) -> Result<Table> {
        let mut merged_members: Vec<(Value, Table)> = Vec::with_capacity(self.len());
        for (key, member) in self.iter() {
            let table = match member {
                TableSetMember::Table(t) => (**t).clone(),
                TableSetMember::Set(s) => s.merge()?,
            };
            merged_members.push((key.clone(), table));
        }

        let (member_names, member_types) = match merged_members.first() {
            Some((_, t)) => (t.column_names().to_vec(), t.column_types().to_vec()),
            None => (
                self.column_names.as_ref().clone(),
                self.column_types.as_ref().clone(),
            ),
        };

        let mut group_column = self.key_name.clone();
        while member_names.contains(&group_column) {
            group_column.push('2');
        }
        let mut names = vec![group_column];
        names.extend(member_names);
        let mut types = vec![self.key_type.clone()];
        types.extend(member_types);

        let names = Arc::new(names);
        let types = Arc::new(types);
        let mut rows = Vec::new();
        for (key, table) in &merged_members {
            for row in table.rows().iter() {
                let mut values = vec![key.clone()];
                values.extend(row.values().iter().cloned());
                rows.push(Arc::new(Row::new(Arc::clone(&names), values)));
            }
        }
        Ok(Table::with_schema(names, types, rows, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn member(values: &[(i64, &str)]) -> Table {
        Table::from_values(
            values
                .iter()
                .map(|(n, t)| vec![Value::from(*n), Value::from(*t)])
                .collect(),
            vec!["n".to_string(), "t".to_string()],
            vec![ValueType::number(), ValueType::text()],
        )
        .unwrap()
    }

    fn set() -> TableSet {
        TableSet::new(
            vec![
                (Value::from("x"), member(&[(1, "a"), (2, "b")])),
                (Value::from("y"), member(&[(3, "c")])),
            ],
            "letter",
            ValueType::text(),
        )
        .unwrap()
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let other = Table::from_values(
            vec![vec![Value::from(1i64)]],
            vec!["n".to_string()],
            vec![ValueType::number()],
        )
        .unwrap();
        let result = TableSet::new(
            vec![
                (Value::from("x"), member(&[(1, "a")])),
                (Value::from("y"), other),
            ],
            "letter",
            ValueType::text(),
        );
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_member_access() {
        let s = set();
        assert_eq!(s.len(), 2);
        assert_eq!(s.keys(), &[Value::from("x"), Value::from("y")]);
        assert!(s.get(&Value::from("x")).is_some());
        assert!(s.get(&Value::from("z")).is_none());
        assert_eq!(s.column_names(), &["n".to_string(), "t".to_string()]);
    }

    #[test]
    fn test_aggregate_flattens_to_table() {
        let s = set();
        let result = s
            .aggregate(&[
                ("count".to_string(), Aggregation::count()),
                ("total".to_string(), Aggregation::sum("n")),
            ])
            .unwrap();
        assert_eq!(
            result.column_names(),
            &[
                "letter".to_string(),
                "count".to_string(),
                "total".to_string()
            ]
        );
        assert_eq!(result.n_rows(), 2);
        assert_eq!(result.row(0).unwrap()[1], Value::from(2i64));
        assert_eq!(result.row(1).unwrap()[2], Value::from(3i64));
        // rows are addressable by grouping key
        let row = result
            .row_by_name(&RowKey::Single(Value::from("y")))
            .unwrap();
        assert_eq!(row[0], Value::from("y"));
    }

    #[test]
    fn test_aggregate_rejects_unsupported() {
        let s = set();
        let result = s.aggregate(&[(
            "p".to_string(),
            Aggregation::Percentiles {
                column: "n".to_string(),
            },
        )]);
        assert!(matches!(result, Err(Error::UnsupportedAggregation(_))));
    }

    #[test]
    fn test_map_tables_preserves_keys() {
        let s = set();
        let filtered = s
            .filter(|row| row[0].cmp_null_max(&Value::from(1i64)).is_gt())
            .unwrap();
        assert_eq!(filtered.keys(), s.keys());
        match filtered.get(&Value::from("x")).unwrap() {
            TableSetMember::Table(t) => assert_eq!(t.n_rows(), 1),
            _ => panic!("expected a table member"),
        }
    }

    #[test]
    fn test_merge_restores_rows_with_group_column() {
        let s = set();
        let merged = s.merge().unwrap();
        assert_eq!(
            merged.column_names(),
            &["letter".to_string(), "n".to_string(), "t".to_string()]
        );
        assert_eq!(merged.n_rows(), 3);
        assert_eq!(merged.row(2).unwrap()[0], Value::from("y"));
    }

    #[test]
    fn test_sum_decimal_exactness_across_groups() {
        let s = set();
        let result = s
            .aggregate(&[("total".to_string(), Aggregation::sum("n"))])
            .unwrap();
        let total: Decimal = result
            .rows()
            .iter()
            .filter_map(|r| r[1].as_number().copied())
            .sum();
        assert_eq!(total, Decimal::from(6));
    }
}
