//! Error taxonomy for the table engine

use thiserror::Error;

/// All failures produced by the engine.
///
/// Every error is a deterministic function of the input data; there is no
/// retry or recovery machinery anywhere in the core.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw value could not be coerced to a column's declared type.
    #[error("cannot cast {value:?} to {data_type}")]
    Cast { value: String, data_type: String },

    /// An operation was applied to a column of an incompatible type.
    #[error("{operation} is not valid for a column of type {data_type}")]
    DataType {
        operation: String,
        data_type: String,
    },

    /// An aggregation cannot be lifted into a single-valued column.
    #[error("{0} cannot be used to aggregate a table set")]
    UnsupportedAggregation(String),

    #[error("column {0:?} does not exist")]
    ColumnDoesNotExist(String),

    #[error("row {0:?} does not exist")]
    RowDoesNotExist(String),

    /// Quantiles require at least one non-null value.
    #[error("{operation} requires at least one non-null value")]
    EmptyData { operation: String },

    /// A join with `require_match` found a left key with no right match.
    #[error("left key {0:?} has no match in the right table")]
    UnmatchedKey(String),

    /// A value lies outside the range covered by a set of quantiles.
    #[error("value {0:?} is outside the range of the quantiles")]
    ValueOutOfRange(String),

    /// A `limit` slice was given malformed parameters.
    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    /// Member tables of a table set disagree on schema.
    #[error("table {key:?} does not match the set schema: {reason}")]
    SchemaMismatch { key: String, reason: String },

    /// A row's length disagrees with the number of columns.
    #[error("row {row} has {actual} values but the table has {expected} columns")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The explicit row-name list disagrees with the number of rows.
    #[error("{actual} row names supplied for {expected} rows")]
    RowNameCountMismatch { expected: usize, actual: usize },

    #[error("column names must be unique: {0:?} appears more than once")]
    DuplicateColumnName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
