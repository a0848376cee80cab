//! Reading and writing tables
//!
//! Adapters deal only in raw text cells; all typing goes through the same
//! inference and casting path as in-memory construction, so a value parses
//! identically no matter where it came from.

pub mod csv;
pub mod json;
