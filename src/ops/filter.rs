//! Projection, filtering, ordering, slicing, and dedup

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::model::row::Row;
use crate::model::table::Table;
use crate::model::value::{RowKey, Value};
use crate::ops::KeySpec;

impl Table {
    /// Project onto the named columns, in the order given. Row order and row
    /// names are preserved.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let indices: Result<Vec<usize>> =
            names.iter().map(|n| self.column_index(n)).collect();
        let indices = indices?;

        let new_names = Arc::new(
            indices
                .iter()
                .map(|&i| self.column_names()[i].clone())
                .collect::<Vec<_>>(),
        );
        let new_types = Arc::new(
            indices
                .iter()
                .map(|&i| self.column_types()[i].clone())
                .collect::<Vec<_>>(),
        );
        let rows: Vec<Arc<Row>> = self
            .rows()
            .iter()
            .map(|row| {
                let values: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
                Arc::new(Row::new(Arc::clone(&new_names), values))
            })
            .collect();
        Ok(Table::with_schema(
            new_names,
            new_types,
            rows,
            self.row_names().map(|k| k.to_vec()),
        ))
    }

    /// Project onto every column except the named ones.
    pub fn exclude(&self, names: &[&str]) -> Result<Table> {
        for name in names {
            self.column_index(name)?;
        }
        let kept: Vec<&str> = self
            .column_names()
            .iter()
            .filter(|n| !names.contains(&n.as_str()))
            .map(|n| n.as_str())
            .collect();
        self.select(&kept)
    }

    /// Keep the rows for which the predicate returns true. Row names of
    /// surviving rows are preserved.
    pub fn filter<P>(&self, predicate: P) -> Table
    where
        P: Fn(&Row) -> bool,
    {
        let mut rows = Vec::new();
        let mut names = self.row_names().map(|_| Vec::new());
        for (i, row) in self.rows().iter().enumerate() {
            if predicate(row) {
                rows.push(Arc::clone(row));
                if let (Some(names), Some(key)) = (names.as_mut(), self.rows().key_at(i)) {
                    names.push(key.clone());
                }
            }
        }
        self.fork(rows, names)
    }

    /// Sort rows by a key. Null sorts strictly greater than every non-null
    /// value; for multi-column keys the comparison is lexicographic over the
    /// tuple, each component using the same null-max rule. The sort is
    /// stable, so ties keep their original order.
    pub fn order_by(&self, key: &KeySpec, reverse: bool) -> Result<Table> {
        let extractor = key.resolve(self)?;
        let mut decorated: Vec<(Vec<Value>, usize)> = self
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| (extractor.extract(row), i))
            .collect();
        decorated.sort_by(|(a, _), (b, _)| {
            let ordering = Value::cmp_seq_null_max(a, b);
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let rows: Vec<Arc<Row>> = decorated
            .iter()
            .map(|&(_, i)| Arc::clone(&self.rows()[i]))
            .collect();
        let names = self.row_names().map(|keys| {
            decorated.iter().map(|&(_, i)| keys[i].clone()).collect()
        });
        Ok(self.fork(rows, names))
    }

    /// Slice the rows with Python-slice semantics: negative offsets count
    /// from the end and a negative step reverses.
    pub fn limit(
        &self,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    ) -> Result<Table> {
        let indices = slice_indices(self.n_rows(), start, stop, step)?;
        let rows: Vec<Arc<Row>> = indices
            .iter()
            .map(|&i| Arc::clone(&self.rows()[i]))
            .collect();
        let names = self
            .row_names()
            .map(|keys| indices.iter().map(|&i| keys[i].clone()).collect());
        Ok(self.fork(rows, names))
    }

    /// Drop rows whose key has been seen before; the first occurrence wins.
    /// With no key, the full row tuple is the identity.
    pub fn distinct(&self, key: Option<&KeySpec>) -> Result<Table> {
        let extractor = match key {
            Some(spec) => Some(spec.resolve(self)?),
            None => None,
        };
        let mut seen: FxHashSet<Vec<Value>> = FxHashSet::default();
        let mut rows = Vec::new();
        let mut names = self.row_names().map(|_| Vec::new());
        for (i, row) in self.rows().iter().enumerate() {
            let identity = match &extractor {
                Some(e) => e.extract(row),
                None => row.values().to_vec(),
            };
            if seen.insert(identity) {
                rows.push(Arc::clone(row));
                if let (Some(names), Some(key)) = (names.as_mut(), self.rows().key_at(i)) {
                    names.push(key.clone());
                }
            }
        }
        Ok(self.fork(rows, names))
    }
}

/// Compute the row indices selected by a Python-style slice.
fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Error::InvalidSlice("step cannot be zero".to_string()));
    }
    let len = len as i64;

    let clamp = |value: i64, low: i64, high: i64| value.max(low).min(high);
    let normalize = |value: i64, low: i64, high: i64| {
        if value < 0 {
            clamp(value + len, low, high)
        } else {
            clamp(value, low, high)
        }
    };

    let (start, stop) = if step > 0 {
        (
            normalize(start.unwrap_or(0), 0, len),
            normalize(stop.unwrap_or(len), 0, len),
        )
    } else {
        (
            normalize(start.unwrap_or(len - 1), -1, len - 1),
            normalize(stop.unwrap_or(-len - 1), -1, len - 1),
        )
    };

    let mut indices = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            indices.push(i as usize);
            i += step;
        }
    } else {
        while i > stop {
            indices.push(i as usize);
            i += step;
        }
    }
    Ok(indices)
}
