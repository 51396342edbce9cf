//! Index keys joining local rows to remote records.

use serde_json::Value;
use std::fmt;

/// The normalized value of the index column for one row or record.
///
/// Keys are derived from the trimmed string rendering of the cell scalar so
/// that a numeric cell on one side matches a stringified number on the other
/// (spreadsheet round-trips routinely flip between the two). Cells that
/// render empty produce no key at all: rows without a usable index value are
/// treated as unmatched and never collide with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(String);

impl IndexKey {
    /// Derives a key from a cell scalar, or `None` if the cell has no
    /// usable index value (null, empty, or whitespace-only rendering).
    pub fn from_value(value: &Value) -> Option<Self> {
        let rendered = match value {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => render_number(n),
            Value::Bool(b) => b.to_string(),
            // Compound cells are rare but possible (multi-select fields);
            // their canonical JSON rendering is a stable join key.
            other => other.to_string(),
        };
        if rendered.is_empty() {
            None
        } else {
            Some(IndexKey(rendered))
        }
    }

    /// Returns the normalized key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a JSON number, collapsing integral floats to their integer form
/// so `1001.0` and `"1001"` produce the same key.
fn render_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f.abs() < 9.0e15 {
            return (f as i64).to_string();
        }
        return f.to_string();
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_keys_are_trimmed() {
        let key = IndexKey::from_value(&json!("  A-1001  ")).unwrap();
        assert_eq!(key.as_str(), "A-1001");
    }

    #[test]
    fn null_and_blank_have_no_key() {
        assert!(IndexKey::from_value(&Value::Null).is_none());
        assert!(IndexKey::from_value(&json!("")).is_none());
        assert!(IndexKey::from_value(&json!("   ")).is_none());
    }

    #[test]
    fn integral_float_matches_integer() {
        let from_float = IndexKey::from_value(&json!(1001.0)).unwrap();
        let from_int = IndexKey::from_value(&json!(1001)).unwrap();
        let from_str = IndexKey::from_value(&json!("1001")).unwrap();
        assert_eq!(from_float, from_int);
        assert_eq!(from_int, from_str);
    }

    #[test]
    fn fractional_float_keeps_fraction() {
        let key = IndexKey::from_value(&json!(10.5)).unwrap();
        assert_eq!(key.as_str(), "10.5");
    }

    #[test]
    fn bool_keys() {
        assert_eq!(IndexKey::from_value(&json!(true)).unwrap().as_str(), "true");
    }
}
