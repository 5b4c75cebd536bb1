//! Lenient JSON column decoding

use serde_json::{Map, Value};
use tracing::warn;

/// Decode a JSON array column into strings
///
/// Non-string scalars are stringified, nulls and blanks dropped. A bare
/// non-JSON string is taken as a single-element array.
pub(crate) fn decode_string_array(raw: Option<&str>, column: &str, row_id: &str) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items.into_iter().filter_map(value_to_text).collect(),
        Ok(Value::Null) => Vec::new(),
        Ok(other) => value_to_text(other).into_iter().collect(),
        Err(_) => {
            warn!(row_id = %row_id, column = %column, "Column is not JSON; treating as single value");
            vec![raw.to_string()]
        }
    }
}

/// Decode a JSON object column; anything that is not an object becomes empty
pub(crate) fn decode_object(raw: Option<&str>, column: &str, row_id: &str) -> Map<String, Value> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Map::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(_) | Err(_) => {
            warn!(row_id = %row_id, column = %column, "Column is not a JSON object; ignoring");
            Map::new()
        }
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_of_strings() {
        assert_eq!(decode_string_array(Some(r#"["a","b"]"#), "c", "r"), vec!["a", "b"]);
    }

    #[test]
    fn test_array_junk_is_filtered() {
        assert_eq!(
            decode_string_array(Some(r#"[null, "", 7, "x"]"#), "c", "r"),
            vec!["7", "x"]
        );
    }

    #[test]
    fn test_bare_string_becomes_single_element() {
        assert_eq!(decode_string_array(Some("PSC_CARROT_NANTES"), "c", "r"), vec!["PSC_CARROT_NANTES"]);
        assert_eq!(decode_string_array(Some(r#""s1""#), "c", "r"), vec!["s1"]);
    }

    #[test]
    fn test_missing_or_null_array_is_empty() {
        assert!(decode_string_array(None, "c", "r").is_empty());
        assert!(decode_string_array(Some("null"), "c", "r").is_empty());
    }

    #[test]
    fn test_object_decoding() {
        let map = decode_object(Some(r#"{"k": 1}"#), "c", "r");
        assert_eq!(map["k"], 1);
        assert!(decode_object(Some("[1,2]"), "c", "r").is_empty());
        assert!(decode_object(Some("{broken"), "c", "r").is_empty());
    }
}
