//! Raw CSV text to typed property values.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::schema::AttributeType;

/// What to do with a cell that cannot be coerced to its declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
pub enum CoercionPolicy {
    /// Store null (removing the property) and keep going.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

/// Result of coercing one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Value(Value),
    Null,
    Invalid,
}

pub fn coerce(raw: &str, ty: AttributeType) -> Coerced {
    let raw = raw.trim();
    if raw.is_empty() {
        return Coerced::Null;
    }

    match ty {
        AttributeType::String => Coerced::Value(Value::String(raw.to_string())),
        AttributeType::Integer => match parse_integer(raw) {
            Some(i) => Coerced::Value(Value::from(i)),
            None => Coerced::Invalid,
        },
        AttributeType::Float => match raw.parse::<f64>() {
            Ok(f) if f.is_nan() => Coerced::Null,
            // JSON has no representation for infinities
            Ok(f) => serde_json::Number::from_f64(f)
                .map(|n| Coerced::Value(Value::Number(n)))
                .unwrap_or(Coerced::Invalid),
            Err(_) => Coerced::Invalid,
        },
        AttributeType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Coerced::Value(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Coerced::Value(Value::Bool(false))
            } else {
                Coerced::Invalid
            }
        }
    }
}

/// Integral text, or floating text truncated toward zero (`"3.0"` -> 3, `"2.9"` -> 2).
pub fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(i);
    }
    let f = raw.parse::<f64>().ok()?;
    if !f.is_finite() || f.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(f.trunc() as i64)
}

/// Sequence part of a composite key: `"1"` and `"1.0"` both render as `1`.
pub fn normalize_sequence(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => match parse_integer(raw) {
            Some(i) => i.to_string(),
            None => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_cells_are_null() {
        for ty in [
            AttributeType::Integer,
            AttributeType::Float,
            AttributeType::Boolean,
            AttributeType::String,
        ] {
            assert_eq!(coerce("", ty), Coerced::Null);
            assert_eq!(coerce("   ", ty), Coerced::Null);
        }
    }

    #[test]
    fn integers_follow_to_integer_truncation() {
        assert_eq!(coerce("42", AttributeType::Integer), Coerced::Value(json!(42)));
        assert_eq!(coerce("3.0", AttributeType::Integer), Coerced::Value(json!(3)));
        assert_eq!(coerce("-2.9", AttributeType::Integer), Coerced::Value(json!(-2)));
        assert_eq!(coerce("abc", AttributeType::Integer), Coerced::Invalid);
        assert_eq!(coerce("inf", AttributeType::Integer), Coerced::Invalid);
    }

    #[test]
    fn floats_and_booleans() {
        assert_eq!(coerce("19.9", AttributeType::Float), Coerced::Value(json!(19.9)));
        assert_eq!(coerce("7", AttributeType::Float), Coerced::Value(json!(7.0)));
        assert_eq!(coerce("NaN", AttributeType::Float), Coerced::Null);
        assert_eq!(coerce("n/a", AttributeType::Float), Coerced::Invalid);

        assert_eq!(coerce("True", AttributeType::Boolean), Coerced::Value(json!(true)));
        assert_eq!(coerce("false", AttributeType::Boolean), Coerced::Value(json!(false)));
        assert_eq!(coerce("yes", AttributeType::Boolean), Coerced::Invalid);
    }

    #[test]
    fn strings_are_kept_verbatim_apart_from_padding() {
        assert_eq!(
            coerce(" 01310 ", AttributeType::String),
            Coerced::Value(json!("01310"))
        );
    }

    #[test]
    fn sequence_numbers_normalize() {
        assert_eq!(normalize_sequence("1"), "1");
        assert_eq!(normalize_sequence("1.0"), "1");
        assert_eq!(normalize_sequence(" 12 "), "12");
        assert_eq!(normalize_sequence("1.5"), "1.5");
        assert_eq!(normalize_sequence("a"), "a");
    }
}
