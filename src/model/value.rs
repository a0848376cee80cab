//! Typed cell values

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde::ser::{Serialize, Serializer};

/// A single cell value with type information.
///
/// Numbers use exact decimal arithmetic so sums, means, and comparisons are
/// reproducible; binary floating point never appears in the data model.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            // Decimal's Hash is consistent with its numeric Eq
            Value::Number(d) => d.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Duration(td) => {
                td.num_seconds().hash(state);
                td.subsec_nanos().hash(state);
            }
        }
    }
}

impl Value {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the decimal payload of a Number value.
    pub fn as_number(&self) -> Option<&Decimal> {
        match self {
            Value::Number(d) => Some(d),
            _ => None,
        }
    }

    /// Truthiness: true only for `Boolean(true)`.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    /// Total ordering in which null sorts strictly greater than every
    /// non-null value and equal only to other nulls.
    ///
    /// Values of different non-null variants compare by variant order, which
    /// keeps the sort deterministic for heterogeneous keys.
    pub fn cmp_null_max(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Number(_) => 1,
            Value::Text(_) => 2,
            Value::Date(_) => 3,
            Value::DateTime(_) => 4,
            Value::Duration(_) => 5,
            Value::Null => 6,
        }
    }

    /// Compare sequences of values element-wise with null-max ordering.
    pub fn cmp_seq_null_max(a: &[Value], b: &[Value]) -> Ordering {
        for (x, y) in a.iter().zip(b.iter()) {
            match x.cmp_null_max(y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }

    /// Human-readable rendering used by the pretty printer and error text.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(d) => d.normalize().to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Duration(td) => format_duration(td),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            // the trait method, not Decimal's inherent byte-array serialize
            Value::Number(d) => serde::Serialize::serialize(d, serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Duration(td) => serializer.serialize_str(&format_duration(td)),
        }
    }
}

/// Format a duration as `[-]H:MM:SS[.fff]`.
pub(crate) fn format_duration(td: &TimeDelta) -> String {
    let negative = *td < TimeDelta::zero();
    let abs = if negative { -*td } else { *td };
    let total_seconds = abs.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let nanos = abs.subsec_nanos();
    let sign = if negative { "-" } else { "" };
    if nanos == 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    } else {
        let millis = nanos / 1_000_000;
        format!("{sign}{hours}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Number(d)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(Decimal::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Name of a row: a single value, or the tuple of grouping-key values
/// produced by nested aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Single(Value),
    Tuple(Vec<Value>),
}

impl RowKey {
    /// Prepend an outer grouping key, turning a single name into a tuple.
    pub fn prepend(&self, outer: Value) -> RowKey {
        match self {
            RowKey::Single(v) => RowKey::Tuple(vec![outer, v.clone()]),
            RowKey::Tuple(vs) => {
                let mut keys = Vec::with_capacity(vs.len() + 1);
                keys.push(outer);
                keys.extend(vs.iter().cloned());
                RowKey::Tuple(keys)
            }
        }
    }

    pub fn display(&self) -> String {
        match self {
            RowKey::Single(v) => v.display(),
            RowKey::Tuple(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.display()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl From<Value> for RowKey {
    fn from(v: Value) -> Self {
        RowKey::Single(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_null_sorts_greater_than_everything() {
        let null = Value::Null;
        let number = Value::Number(dec("1000000"));
        let text = Value::Text("zzz".to_string());
        assert_eq!(null.cmp_null_max(&number), Ordering::Greater);
        assert_eq!(null.cmp_null_max(&text), Ordering::Greater);
        assert_eq!(number.cmp_null_max(&null), Ordering::Less);
        assert_eq!(null.cmp_null_max(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_sequence_ordering_with_null_component() {
        let a = vec![Value::from(1i64), Value::Null];
        let b = vec![Value::from(1i64), Value::from(2i64)];
        assert_eq!(Value::cmp_seq_null_max(&a, &b), Ordering::Greater);
        assert_eq!(Value::cmp_seq_null_max(&b, &a), Ordering::Less);
    }

    #[test]
    fn test_number_equality_ignores_scale() {
        let a = Value::Number(dec("1.50"));
        let b = Value::Number(dec("1.5"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duration_display() {
        let td = TimeDelta::seconds(3661);
        assert_eq!(format_duration(&td), "1:01:01");
        assert_eq!(format_duration(&-td), "-1:01:01");
    }

    #[test]
    fn test_serialize_to_json() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Boolean(true)).unwrap(), "true");
        // decimals serialize as strings, keeping their digits exactly
        assert_eq!(
            serde_json::to_string(&Value::Number(dec("1.5"))).unwrap(),
            "\"1.5\""
        );
        assert_eq!(
            serde_json::to_string(&Value::Text("x".to_string())).unwrap(),
            "\"x\""
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            serde_json::to_string(&Value::Date(date)).unwrap(),
            "\"2024-01-05\""
        );
        assert_eq!(
            serde_json::to_string(&Value::Duration(TimeDelta::seconds(61))).unwrap(),
            "\"0:01:01\""
        );
    }

    #[test]
    fn test_row_key_prepend() {
        let key = RowKey::Single(Value::from("a"));
        let nested = key.prepend(Value::from("outer"));
        assert_eq!(
            nested,
            RowKey::Tuple(vec![Value::from("outer"), Value::from("a")])
        );
        let deeper = nested.prepend(Value::from("top"));
        assert_eq!(
            deeper,
            RowKey::Tuple(vec![
                Value::from("top"),
                Value::from("outer"),
                Value::from("a")
            ])
        );
    }
}
