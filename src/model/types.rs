//! Value types: per-column coercion contracts and type inference
//!
//! Each type implements a cheap `test` predicate (never fails, false on
//! ambiguous input) and an authoritative `cast` (typed error on invalid
//! input). The `TypeTester` infers one type per column by eliminating
//! candidates whose `test` fails on sampled cells.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::config::TypeOptions;
use crate::error::{Error, Result};
use crate::model::value::{format_duration, Value};

const TRUE_VALUES: &[&str] = &["true", "t", "yes", "y", "1"];
const FALSE_VALUES: &[&str] = &["false", "f", "no", "n", "0"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// The bare kind of a value type, without parse configuration.
///
/// Used wherever only structural compatibility matters (table-set schema
/// checks, capability queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean,
    Number,
    Text,
    Date,
    DateTime,
    Duration,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Boolean => write!(f, "Boolean"),
            TypeKind::Number => write!(f, "Number"),
            TypeKind::Text => write!(f, "Text"),
            TypeKind::Date => write!(f, "Date"),
            TypeKind::DateTime => write!(f, "DateTime"),
            TypeKind::Duration => write!(f, "Duration"),
        }
    }
}

/// A column's data type together with its parse configuration.
#[derive(Debug, Clone)]
pub struct ValueType {
    kind: TypeKind,
    options: TypeOptions,
}

impl ValueType {
    pub fn new(kind: TypeKind, options: TypeOptions) -> Self {
        Self { kind, options }
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean, TypeOptions::default())
    }

    pub fn number() -> Self {
        Self::new(TypeKind::Number, TypeOptions::default())
    }

    pub fn text() -> Self {
        Self::new(TypeKind::Text, TypeOptions::default())
    }

    pub fn date() -> Self {
        Self::new(TypeKind::Date, TypeOptions::default())
    }

    pub fn date_time() -> Self {
        Self::new(TypeKind::DateTime, TypeOptions::default())
    }

    pub fn duration() -> Self {
        Self::new(TypeKind::Duration, TypeOptions::default())
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn options(&self) -> &TypeOptions {
        &self.options
    }

    /// Whether values of this type support arithmetic.
    pub fn is_numeric(&self) -> bool {
        self.kind == TypeKind::Number
    }

    /// Whether values of this type are points or spans on the time line.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Date | TypeKind::DateTime | TypeKind::Duration
        )
    }

    /// Cheap type-compatibility check; never fails.
    pub fn test(&self, raw: Option<&str>) -> bool {
        let raw = match raw {
            None => return true,
            Some(r) => r,
        };
        if self.options.is_null(raw) {
            return true;
        }
        let trimmed = raw.trim();
        match self.kind {
            TypeKind::Boolean => parse_boolean(trimmed).is_some(),
            TypeKind::Number => parse_number(trimmed, &self.options).is_some(),
            TypeKind::Text => true,
            TypeKind::Date => parse_date(trimmed).is_some(),
            TypeKind::DateTime => parse_datetime(trimmed).is_some(),
            TypeKind::Duration => parse_duration(trimmed).is_some(),
        }
    }

    /// Authoritative coercion of raw text into a typed value.
    ///
    /// Null aliases map to `Value::Null`; anything unparseable is a
    /// [`Error::Cast`]. Pure: the same input and configuration always produce
    /// the same result.
    pub fn cast(&self, raw: Option<&str>) -> Result<Value> {
        let raw = match raw {
            None => return Ok(Value::Null),
            Some(r) => r,
        };
        if self.options.is_null(raw) {
            return Ok(Value::Null);
        }
        let trimmed = raw.trim();
        let parsed = match self.kind {
            TypeKind::Boolean => parse_boolean(trimmed).map(Value::Boolean),
            TypeKind::Number => parse_number(trimmed, &self.options).map(Value::Number),
            TypeKind::Text => Some(Value::Text(trimmed.to_string())),
            TypeKind::Date => parse_date(trimmed).map(Value::Date),
            TypeKind::DateTime => parse_datetime(trimmed).map(Value::DateTime),
            TypeKind::Duration => parse_duration(trimmed).map(Value::Duration),
        };
        parsed.ok_or_else(|| Error::Cast {
            value: raw.to_string(),
            data_type: self.kind.to_string(),
        })
    }

    /// Coerce an already-typed value: matching variants pass through
    /// untouched, text goes through string parsing, anything else fails.
    pub fn cast_value(&self, value: &Value) -> Result<Value> {
        match (self.kind, value) {
            (_, Value::Null) => Ok(Value::Null),
            (TypeKind::Boolean, Value::Boolean(_))
            | (TypeKind::Number, Value::Number(_))
            | (TypeKind::Date, Value::Date(_))
            | (TypeKind::DateTime, Value::DateTime(_))
            | (TypeKind::Duration, Value::Duration(_))
            | (TypeKind::Text, Value::Text(_)) => Ok(value.clone()),
            (TypeKind::Text, other) => Ok(Value::Text(other.display())),
            (_, Value::Text(s)) => self.cast(Some(s)),
            (_, other) => Err(Error::Cast {
                value: other.display(),
                data_type: self.kind.to_string(),
            }),
        }
    }

    /// Render a value back to text for delimited output. Null becomes the
    /// empty string.
    pub fn csvify(&self, value: &Value) -> String {
        value.display()
    }

    /// Render a value as a structured JSON value, keeping numeric precision.
    pub fn jsonify(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(d) => {
                let text = d.normalize().to_string();
                match serde_json::from_str::<serde_json::Number>(&text) {
                    Ok(n) => serde_json::Value::Number(n),
                    Err(_) => serde_json::Value::String(text),
                }
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Duration(td) => serde_json::Value::String(format_duration(td)),
        }
    }
}

fn parse_boolean(s: &str) -> Option<bool> {
    if TRUE_VALUES.iter().any(|t| t.eq_ignore_ascii_case(s)) {
        Some(true)
    } else if FALSE_VALUES.iter().any(|f| f.eq_ignore_ascii_case(s)) {
        Some(false)
    } else {
        None
    }
}

fn parse_number(s: &str, options: &TypeOptions) -> Option<Decimal> {
    let mut cleaned = s.to_string();
    for symbol in &options.currency_symbols {
        cleaned = cleaned.replace(symbol.as_str(), "");
    }
    cleaned = cleaned.replace(options.group_symbol.as_str(), "");
    if options.decimal_symbol != "." {
        cleaned = cleaned.replace(options.decimal_symbol.as_str(), ".");
    }
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str_exact(cleaned)
        .ok()
        .or_else(|| Decimal::from_scientific(cleaned).ok())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// A bare date never parses as DateTime; inference relies on that to keep
/// Date columns from being claimed by the more-preferred DateTime candidate.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parse a duration in clock form (`H:MM:SS`, `M:SS`) or unit form
/// (`1d 2h 30m 45s`, fractional amounts allowed). A bare number is not a
/// duration.
fn parse_duration(s: &str) -> Option<TimeDelta> {
    if s.contains(':') {
        return parse_clock_duration(s);
    }
    parse_unit_duration(s)
}

fn parse_clock_duration(s: &str) -> Option<TimeDelta> {
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s),
    };
    let parts: Vec<&str> = body.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [h, m, s] => (
            h.parse::<f64>().ok()?,
            m.parse::<f64>().ok()?,
            s.parse::<f64>().ok()?,
        ),
        _ => return None,
    };
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    let millis = (total * 1000.0).round() as i64;
    Some(TimeDelta::milliseconds(sign * millis))
}

fn parse_unit_duration(s: &str) -> Option<TimeDelta> {
    let mut total_millis = 0.0f64;
    let mut any = false;
    for token in s.split_whitespace() {
        let split = token.find(|c: char| c.is_ascii_alphabetic())?;
        let (amount, unit) = token.split_at(split);
        let amount: f64 = amount.parse().ok()?;
        let millis_per = match unit.to_ascii_lowercase().as_str() {
            "w" | "wk" | "weeks" | "week" => 7.0 * 86_400_000.0,
            "d" | "day" | "days" => 86_400_000.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
            "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
            "ms" => 1.0,
            _ => return None,
        };
        total_millis += amount * millis_per;
        any = true;
    }
    if !any {
        return None;
    }
    Some(TimeDelta::milliseconds(total_millis.round() as i64))
}

/// Infers one value type per column from a sample of raw rows.
///
/// Candidates are kept in fixed preference order, most specific first with
/// Text as the universal fallback. For each column a hypothesis set starts
/// with every candidate; sampled cells eliminate candidates whose `test`
/// fails, and the first survivor in preference order wins.
#[derive(Debug, Clone)]
pub struct TypeTester {
    types: Vec<ValueType>,
    force: IndexMap<String, ValueType>,
    limit: Option<usize>,
}

impl Default for TypeTester {
    fn default() -> Self {
        Self {
            types: vec![
                ValueType::boolean(),
                ValueType::number(),
                ValueType::duration(),
                ValueType::date_time(),
                ValueType::date(),
                ValueType::text(),
            ],
            force: IndexMap::new(),
            limit: None,
        }
    }
}

impl TypeTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns in this mapping skip inference and use the supplied type.
    pub fn with_force(mut self, force: IndexMap<String, ValueType>) -> Self {
        self.force = force;
        self
    }

    /// Only sample the first `limit` rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Replace the candidate list (preference order, Text last).
    pub fn with_types(mut self, types: Vec<ValueType>) -> Self {
        self.types = types;
        self
    }

    /// Infer a type for each named column from the sampled rows.
    ///
    /// An all-null column keeps every candidate viable, so the most-preferred
    /// candidate (Boolean) wins. That quirk is part of the contract; force
    /// the column to Text to avoid it.
    pub fn run(&self, rows: &[Vec<Option<String>>], column_names: &[String]) -> Vec<ValueType> {
        let n_columns = column_names.len();
        let mut hypotheses: Vec<Vec<bool>> = vec![vec![true; self.types.len()]; n_columns];

        let sample = match self.limit {
            Some(limit) => &rows[..rows.len().min(limit)],
            None => rows,
        };

        for row in sample {
            for (col, hypothesis) in hypotheses.iter_mut().enumerate() {
                if hypothesis.iter().filter(|&&alive| alive).count() <= 1 {
                    continue;
                }
                let cell = row.get(col).and_then(|c| c.as_deref());
                for (i, candidate) in self.types.iter().enumerate() {
                    if hypothesis[i] && !candidate.test(cell) {
                        hypothesis[i] = false;
                    }
                }
            }
        }

        column_names
            .iter()
            .enumerate()
            .map(|(col, name)| {
                if let Some(forced) = self.force.get(name) {
                    return forced.clone();
                }
                let survivor = hypotheses[col]
                    .iter()
                    .position(|&alive| alive)
                    .unwrap_or(self.types.len() - 1);
                self.types[survivor].clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<Option<String>>> {
        rows.iter()
            .map(|row| row.iter().map(|c| Some(c.to_string())).collect())
            .collect()
    }

    #[test]
    fn test_boolean_cast() {
        let t = ValueType::boolean();
        assert_eq!(t.cast(Some("True")).unwrap(), Value::Boolean(true));
        assert_eq!(t.cast(Some("no")).unwrap(), Value::Boolean(false));
        assert_eq!(t.cast(Some("")).unwrap(), Value::Null);
        assert!(t.cast(Some("maybe")).is_err());
    }

    #[test]
    fn test_number_cast_strips_locale_symbols() {
        let t = ValueType::number();
        assert_eq!(
            t.cast(Some("$1,234.50")).unwrap(),
            Value::Number(Decimal::from_str_exact("1234.50").unwrap())
        );
        assert_eq!(
            t.cast(Some("-2.5")).unwrap(),
            Value::Number(Decimal::from_str_exact("-2.5").unwrap())
        );
        assert!(t.cast(Some("abc")).is_err());
    }

    #[test]
    fn test_number_cast_is_exact() {
        let t = ValueType::number();
        let v = t.cast(Some("0.1")).unwrap();
        let d = match v {
            Value::Number(d) => d,
            _ => panic!("expected number"),
        };
        assert_eq!(d + d + d, Decimal::from_str_exact("0.3").unwrap());
    }

    #[test]
    fn test_date_and_datetime_are_distinct() {
        assert!(ValueType::date().test(Some("2024-03-01")));
        assert!(!ValueType::date_time().test(Some("2024-03-01")));
        assert!(ValueType::date_time().test(Some("2024-03-01 10:30:00")));
        assert!(!ValueType::date().test(Some("2024-03-01 10:30:00")));
    }

    #[test]
    fn test_duration_forms() {
        let t = ValueType::duration();
        assert_eq!(
            t.cast(Some("1:30:45")).unwrap(),
            Value::Duration(TimeDelta::seconds(5445))
        );
        assert_eq!(
            t.cast(Some("4:13")).unwrap(),
            Value::Duration(TimeDelta::seconds(253))
        );
        assert_eq!(
            t.cast(Some("1h 30m")).unwrap(),
            Value::Duration(TimeDelta::seconds(5400))
        );
        // a bare number is not a duration
        assert!(!t.test(Some("90")));
    }

    #[test]
    fn test_cast_value_pass_through_and_reject() {
        let t = ValueType::number();
        let d = Value::Number(Decimal::from(7));
        assert_eq!(t.cast_value(&d).unwrap(), d);
        assert_eq!(t.cast_value(&Value::Text("7".to_string())).unwrap(), d);
        assert!(t.cast_value(&Value::Boolean(true)).is_err());
        assert_eq!(
            ValueType::text().cast_value(&d).unwrap(),
            Value::Text("7".to_string())
        );
    }

    #[test]
    fn test_inference_number() {
        let rows = vec![
            vec![Some("1.7".to_string())],
            vec![Some("200000000".to_string())],
            vec![Some("".to_string())],
        ];
        let types = TypeTester::new().run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Number);
    }

    #[test]
    fn test_inference_boolean() {
        let rows = vec![
            vec![Some("True".to_string())],
            vec![Some("FALSE".to_string())],
            vec![Some("".to_string())],
        ];
        let types = TypeTester::new().run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Boolean);
    }

    #[test]
    fn test_inference_falls_back_to_text() {
        let rows = raw(&[&["1.7"], &["hello"]]);
        let types = TypeTester::new().run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Text);
    }

    #[test]
    fn test_inference_all_null_column_is_boolean() {
        // Documented quirk: every candidate survives, the most-preferred wins.
        let rows = raw(&[&[""], &[""]]);
        let types = TypeTester::new().run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Boolean);
    }

    #[test]
    fn test_force_overrides_inference() {
        let rows = raw(&[&["1"], &["2"]]);
        let mut force = IndexMap::new();
        force.insert("a".to_string(), ValueType::text());
        let types = TypeTester::new().with_force(force).run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Text);
    }

    #[test]
    fn test_sample_limit() {
        // Only the first row is sampled, so the trailing text never
        // eliminates Number.
        let rows = raw(&[&["1.5"], &["not a number"]]);
        let types = TypeTester::new().with_limit(1).run(&rows, &["a".to_string()]);
        assert_eq!(types[0].kind(), TypeKind::Number);
    }
}
