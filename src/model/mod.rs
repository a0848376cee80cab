//! Core data model: values, types, rows, columns, tables, table sets

pub mod column;
pub mod row;
pub mod sequence;
pub mod table;
pub mod tableset;
pub mod types;
pub mod value;

pub use column::Column;
pub use row::Row;
pub use sequence::KeyedSequence;
pub use table::{RowNameSpec, Table, TableOptions, TypeSpec};
pub use tableset::{TableSet, TableSetMember};
pub use types::{TypeKind, TypeTester, ValueType};
pub use value::{RowKey, Value};
