//! Common validation rules for mapped records.

use std::sync::LazyLock;

use regex::Regex;

use crate::value::FieldValue;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Validates an email address against the sync pipeline's address rule.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Validates that a value is numeric (a number, or text that parses as one).
pub fn is_numeric(value: &FieldValue) -> bool {
    value.is_numeric()
}

/// Validates that a value is a number strictly greater than zero.
pub fn is_positive(value: &FieldValue) -> bool {
    value.as_f64().map(|f| f > 0.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+tag@sub.domain.org"));
        assert!(is_valid_email("x@y.co"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@domain"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user name@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric(&FieldValue::Int(10)));
        assert!(is_numeric(&FieldValue::Float(-1.5)));
        assert!(is_numeric(&FieldValue::Text("42".into())));
        assert!(!is_numeric(&FieldValue::Text("forty-two".into())));
        assert!(!is_numeric(&FieldValue::Null));
    }

    #[test]
    fn test_is_positive() {
        assert!(is_positive(&FieldValue::Int(1)));
        assert!(is_positive(&FieldValue::Float(0.01)));
        assert!(is_positive(&FieldValue::Text("5".into())));
        assert!(!is_positive(&FieldValue::Int(0)));
        assert!(!is_positive(&FieldValue::Float(-3.0)));
        assert!(!is_positive(&FieldValue::Null));
        assert!(!is_positive(&FieldValue::Text("abc".into())));
    }
}
