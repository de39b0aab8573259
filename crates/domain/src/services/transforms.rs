//! Named per-field transform registry.
//!
//! Table descriptors reference transforms by name; the registry resolves the
//! name to a pure, synchronous function at apply time. A transform receives
//! the current value and the full source row, and returns the replacement
//! value or an error. On error the mapper keeps the pre-transform value and
//! records a warning.

use std::collections::HashMap;
use std::sync::LazyLock;

use shared::value::{FieldValue, Row};
use thiserror::Error;

/// A pure per-value transform.
pub type TransformFn = fn(&FieldValue, &Row) -> Result<FieldValue, TransformError>;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unknown transform '{0}'")]
    Unknown(String),

    #[error("{0}")]
    Failed(String),
}

static REGISTRY: LazyLock<HashMap<&'static str, TransformFn>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, TransformFn> = HashMap::new();
    map.insert("normalize_email", normalize_email);
    map.insert("clean_phone", clean_phone);
    map.insert("map_user_status", map_user_status);
    map.insert("map_bet_result", map_bet_result);
    map.insert("parse_amount", parse_amount);
    map
});

/// Looks up a registered transform by name.
pub fn lookup(name: &str) -> Option<TransformFn> {
    REGISTRY.get(name).copied()
}

/// Applies the named transform to a value.
pub fn apply(name: &str, value: &FieldValue, row: &Row) -> Result<FieldValue, TransformError> {
    let f = lookup(name).ok_or_else(|| TransformError::Unknown(name.to_string()))?;
    f(value, row)
}

/// Lowercases and trims an email address.
fn normalize_email(value: &FieldValue, _row: &Row) -> Result<FieldValue, TransformError> {
    match value {
        FieldValue::Text(s) => Ok(FieldValue::Text(s.trim().to_lowercase())),
        FieldValue::Null => Ok(FieldValue::Null),
        other => Err(TransformError::Failed(format!(
            "expected text email, got {}",
            other
        ))),
    }
}

/// Strips formatting from a phone number, keeping digits and a leading `+`.
fn clean_phone(value: &FieldValue, _row: &Row) -> Result<FieldValue, TransformError> {
    match value {
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            let mut cleaned = String::with_capacity(trimmed.len());
            for (i, c) in trimmed.chars().enumerate() {
                if c.is_ascii_digit() || (i == 0 && c == '+') {
                    cleaned.push(c);
                }
            }
            if cleaned.is_empty() {
                Ok(FieldValue::Null)
            } else {
                Ok(FieldValue::Text(cleaned))
            }
        }
        FieldValue::Int(i) => Ok(FieldValue::Text(i.to_string())),
        FieldValue::Null => Ok(FieldValue::Null),
        other => Err(TransformError::Failed(format!(
            "expected text phone, got {}",
            other
        ))),
    }
}

/// Maps upstream user status codes onto the canonical status set.
fn map_user_status(value: &FieldValue, _row: &Row) -> Result<FieldValue, TransformError> {
    let canonical = match value {
        FieldValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "active" | "enabled" => "active",
            "0" | "inactive" | "disabled" => "inactive",
            "banned" | "blocked" | "suspended" => "suspended",
            "deleted" | "removed" => "deleted",
            other => {
                return Err(TransformError::Failed(format!(
                    "unmapped user status '{}'",
                    other
                )))
            }
        },
        FieldValue::Int(1) => "active",
        FieldValue::Int(0) => "inactive",
        FieldValue::Bool(true) => "active",
        FieldValue::Bool(false) => "inactive",
        FieldValue::Null => return Ok(FieldValue::Null),
        other => {
            return Err(TransformError::Failed(format!(
                "unmapped user status '{}'",
                other
            )))
        }
    };
    Ok(FieldValue::Text(canonical.to_string()))
}

/// Maps upstream bet result codes onto {win, loss, draw, refund}.
fn map_bet_result(value: &FieldValue, _row: &Row) -> Result<FieldValue, TransformError> {
    let canonical = match value {
        FieldValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "w" | "win" | "won" => "win",
            "l" | "loss" | "lost" | "lose" => "loss",
            "d" | "draw" | "push" | "void" => "draw",
            "r" | "refund" | "refunded" => "refund",
            other => {
                return Err(TransformError::Failed(format!(
                    "unmapped bet result '{}'",
                    other
                )))
            }
        },
        FieldValue::Null => return Ok(FieldValue::Null),
        other => {
            return Err(TransformError::Failed(format!(
                "unmapped bet result '{}'",
                other
            )))
        }
    };
    Ok(FieldValue::Text(canonical.to_string()))
}

/// Parses a monetary amount, tolerating currency symbols and separators.
fn parse_amount(value: &FieldValue, _row: &Row) -> Result<FieldValue, TransformError> {
    match value {
        FieldValue::Int(i) => Ok(FieldValue::Float(*i as f64)),
        FieldValue::Float(f) => Ok(FieldValue::Float(*f)),
        FieldValue::Null => Ok(FieldValue::Null),
        FieldValue::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| TransformError::Failed(format!("unparseable amount '{}'", s)))
        }
        other => Err(TransformError::Failed(format!(
            "unparseable amount '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_row() -> Row {
        Row::new()
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert!(lookup("normalize_email").is_some());
        assert!(lookup("parse_amount").is_some());
        assert!(lookup("no_such_transform").is_none());
    }

    #[test]
    fn test_apply_unknown_name() {
        let err = apply("bogus", &FieldValue::Null, &empty_row()).unwrap_err();
        assert!(matches!(err, TransformError::Unknown(_)));
    }

    #[test]
    fn test_normalize_email() {
        let out = apply(
            "normalize_email",
            &FieldValue::Text("  User@Example.COM ".into()),
            &empty_row(),
        )
        .unwrap();
        assert_eq!(out, FieldValue::Text("user@example.com".into()));
    }

    #[test]
    fn test_clean_phone() {
        let out = apply(
            "clean_phone",
            &FieldValue::Text("+55 (11) 91234-5678".into()),
            &empty_row(),
        )
        .unwrap();
        assert_eq!(out, FieldValue::Text("+5511912345678".into()));

        let out = apply("clean_phone", &FieldValue::Text("n/a".into()), &empty_row()).unwrap();
        assert_eq!(out, FieldValue::Null);
    }

    #[test]
    fn test_map_user_status() {
        let cases = [
            ("Active", "active"),
            ("1", "active"),
            ("disabled", "inactive"),
            ("BANNED", "suspended"),
            ("deleted", "deleted"),
        ];
        for (input, expected) in cases {
            let out =
                apply("map_user_status", &FieldValue::Text(input.into()), &empty_row()).unwrap();
            assert_eq!(out, FieldValue::Text(expected.into()));
        }
        assert!(apply(
            "map_user_status",
            &FieldValue::Text("weird".into()),
            &empty_row()
        )
        .is_err());
    }

    #[test]
    fn test_map_user_status_numeric_and_bool() {
        assert_eq!(
            apply("map_user_status", &FieldValue::Int(1), &empty_row()).unwrap(),
            FieldValue::Text("active".into())
        );
        assert_eq!(
            apply("map_user_status", &FieldValue::Bool(false), &empty_row()).unwrap(),
            FieldValue::Text("inactive".into())
        );
    }

    #[test]
    fn test_map_bet_result() {
        assert_eq!(
            apply("map_bet_result", &FieldValue::Text("WON".into()), &empty_row()).unwrap(),
            FieldValue::Text("win".into())
        );
        assert_eq!(
            apply("map_bet_result", &FieldValue::Text("lost".into()), &empty_row()).unwrap(),
            FieldValue::Text("loss".into())
        );
        assert!(apply(
            "map_bet_result",
            &FieldValue::Text("maybe".into()),
            &empty_row()
        )
        .is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            apply(
                "parse_amount",
                &FieldValue::Text("R$ 1.234.56".into()),
                &empty_row()
            )
            .ok(),
            None,
            "multiple separators do not silently parse"
        );
        assert_eq!(
            apply("parse_amount", &FieldValue::Text("$99.90".into()), &empty_row()).unwrap(),
            FieldValue::Float(99.9)
        );
        assert_eq!(
            apply("parse_amount", &FieldValue::Int(12), &empty_row()).unwrap(),
            FieldValue::Float(12.0)
        );
        assert!(apply(
            "parse_amount",
            &FieldValue::Text("free".into()),
            &empty_row()
        )
        .is_err());
    }

    #[test]
    fn test_transforms_are_deterministic() {
        let v = FieldValue::Text("  User@X.io".into());
        let a = apply("normalize_email", &v, &empty_row()).unwrap();
        let b = apply("normalize_email", &v, &empty_row()).unwrap();
        assert_eq!(a, b);
    }
}
