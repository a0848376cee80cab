//! tabula - Immutable in-memory tabular data engine
//!
//! Tables carry typed columns (exact decimals, dates, durations) inferred
//! from raw text, and support SQL-like relational operators: select, filter,
//! order, join, group, aggregate, compute, pivot, normalize/denormalize.
//! Every operation returns a new table; unchanged rows are shared, never
//! copied.

pub mod aggregate;
pub mod compute;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod ops;
pub mod render;

pub use aggregate::{AggregateResult, Aggregation, Quantiles};
pub use compute::Computation;
pub use config::TypeOptions;
pub use error::{Error, Result};
pub use model::{
    Column, KeyedSequence, Row, RowKey, RowNameSpec, Table, TableOptions, TableSet,
    TableSetMember, TypeKind, TypeSpec, TypeTester, Value, ValueType,
};
pub use ops::{JoinOptions, KeySpec, PivotOptions};
