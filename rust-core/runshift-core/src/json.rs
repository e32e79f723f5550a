//! # JSON Module
//!
//! Parsing goes through simd-json, serialization through `serde_json`.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into a typed value using simd-json
///
/// simd-json parses in place, so the input is copied into a scratch buffer.
///
/// # Errors
///
/// Returns `Error::Serialization` if parsing fails
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();

    simd_json::from_slice(&mut bytes).map_err(|e| Error::Serialization {
        message: format!("Parse error: {e}"),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Serialization {
        message: format!("Serialize error: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Source {
        name: String,
        url: String,
    }

    #[test]
    fn test_parse_json_list() {
        let json = r#"[{"name": "organizer", "url": "https://example.com"}]"#;
        let sources: Vec<Source> = parse_json(json).unwrap();
        assert_eq!(sources[0].name, "organizer");
    }

    #[test]
    fn test_parse_json_values() {
        let tags: Vec<Value> = parse_json(r#"["flat", "scenic", 3]"#).unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&serde_json::json!({ "ok": true })).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<Vec<Value>> = parse_json("not valid json");
        assert!(matches!(result, Err(Error::Serialization { .. })));
    }
}
