//! Typed scalar values for extracted and mapped rows.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

/// A single column value read from the source database or produced by the
/// record mapper. Timestamps are always UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

/// An extracted row: ordered mapping from column name to value.
///
/// Column order follows the source SELECT list, so pagination and logging
/// stay stable across batches.
pub type Row = IndexMap<String, FieldValue>;

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True when the value is empty for validation purposes: SQL NULL or
    /// blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// True when the value carries a number or numeric text.
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Numeric view of the value, when one exists. Numeric text counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Uuid(u) => write!(f, "{}", u),
            FieldValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self {
        FieldValue::Uuid(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_is_empty() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Text("".into()).is_empty());
        assert!(FieldValue::Text("   ".into()).is_empty());
        assert!(!FieldValue::Text("x".into()).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(FieldValue::Int(7).as_f64(), Some(7.0));
        assert_eq!(FieldValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::Text("12.25".into()).as_f64(), Some(12.25));
        assert_eq!(FieldValue::Text(" 3 ".into()).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Text("abc".into()).as_f64(), None);
        assert_eq!(FieldValue::Null.as_f64(), None);
        assert_eq!(FieldValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(FieldValue::Int(42).as_i64(), Some(42));
        assert_eq!(FieldValue::Float(42.0).as_i64(), Some(42));
        assert_eq!(FieldValue::Float(42.5).as_i64(), None);
        assert_eq!(FieldValue::Text("42".into()).as_i64(), Some(42));
    }

    #[test]
    fn test_is_numeric() {
        assert!(FieldValue::Int(1).is_numeric());
        assert!(FieldValue::Text("1e3".into()).is_numeric());
        assert!(!FieldValue::Text("one".into()).is_numeric());
        assert!(!FieldValue::Null.is_numeric());
    }

    #[test]
    fn test_display_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 14, 22, 0).unwrap();
        let v = FieldValue::Timestamp(ts);
        assert!(v.to_string().starts_with("2025-03-10T14:22:00"));
    }

    #[test]
    fn test_row_preserves_insertion_order() {
        let mut row = Row::new();
        row.insert("id".to_string(), FieldValue::Int(1));
        row.insert("email".to_string(), FieldValue::Text("a@b.co".into()));
        row.insert("amount".to_string(), FieldValue::Float(9.5));

        let keys: Vec<&str> = row.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "email", "amount"]);
    }

    #[test]
    fn test_serialize_untagged() {
        let v = serde_json::to_value(FieldValue::Int(5)).unwrap();
        assert_eq!(v, serde_json::json!(5));
        let v = serde_json::to_value(FieldValue::Null).unwrap();
        assert_eq!(v, serde_json::Value::Null);
    }
}
