//! # Path Parameter Types
//!
//! Typed path parameters for route patterns such as `/api/races/{id:int}`.

use crate::error::{Error, Result};
use std::fmt;

/// Supported path parameter types
///
/// Used during route registration to specify expected types.
/// Default is `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// String type (default) - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    Int,
}

impl ParamType {
    /// Parse type specifier from route pattern (e.g., "int" from "{id:int}")
    #[must_use]
    pub fn from_specifier(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "int" | "integer" | "i64" => Self::Int,
            _ => Self::String,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Converted parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// String value (no conversion performed, or conversion failed)
    String(String),
    /// Integer value (i64)
    Int(i64),
}

impl ParamValue {
    /// Get the value as a string
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
        }
    }

    /// Get as i64 if Int variant
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }
}

/// Convert raw string to typed value based on `ParamType`
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if conversion fails.
pub fn convert_param(raw: &str, param_type: ParamType) -> Result<ParamValue> {
    match param_type {
        ParamType::String => Ok(ParamValue::String(raw.to_string())),
        ParamType::Int => raw.parse::<i64>().map(ParamValue::Int).map_err(|_| {
            Error::InvalidRoutePattern {
                pattern: raw.to_string(),
                reason: format!("Cannot convert '{raw}' to integer"),
            }
        }),
    }
}

/// Parse a path segment pattern to extract name and type
///
/// - `{url}` -> ("url", `ParamType::String`)
/// - `{id:int}` -> ("id", `ParamType::Int`)
///
/// Returns `None` for static segments.
#[must_use]
pub fn parse_param_pattern(segment: &str) -> Option<(String, ParamType)> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    match inner.split_once(':') {
        Some((name, type_spec)) => Some((name.to_string(), ParamType::from_specifier(type_spec))),
        None => Some((inner.to_string(), ParamType::String)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_from_specifier() {
        assert_eq!(ParamType::from_specifier("int"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("INT"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("unknown"), ParamType::String);
    }

    #[test]
    fn test_convert_int() {
        assert_eq!(convert_param("123", ParamType::Int).unwrap(), ParamValue::Int(123));
        assert!(convert_param("abc", ParamType::Int).is_err());
    }

    #[test]
    fn test_parse_param_pattern() {
        assert_eq!(
            parse_param_pattern("{id:int}"),
            Some(("id".to_string(), ParamType::Int))
        );
        assert_eq!(
            parse_param_pattern("{slug}"),
            Some(("slug".to_string(), ParamType::String))
        );
        assert_eq!(parse_param_pattern("races"), None);
    }

    #[test]
    fn test_param_value_accessors() {
        assert_eq!(ParamValue::Int(42).as_string(), "42");
        assert_eq!(ParamValue::Int(42).as_int(), Some(42));
        assert_eq!(ParamValue::String("x".into()).as_int(), None);
    }
}
