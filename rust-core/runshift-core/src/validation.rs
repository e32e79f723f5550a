//! # Validation Module
//!
//! Structured validation errors for client-facing 400 responses.
//! Detected before any store access.

use serde::Serialize;
use std::collections::HashMap;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is invalid type
    InvalidType,
    /// Value doesn't match the expected format
    InvalidFormat,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    /// Query parameter or path segment name (e.g. "dateFrom", "id")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is required"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be {expected}"),
            field: field_str,
            code: ValidationCode::InvalidType,
        }
    }

    /// Create an "invalid format" error
    pub fn invalid_format(field: impl Into<String>, format: &str) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be formatted as {format}"),
            field: field_str,
            code: ValidationCode::InvalidFormat,
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when empty, otherwise the collected errors
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one field error was recorded.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_required() {
        let error = FieldError::required("dateFrom");
        assert_eq!(error.field, "dateFrom");
        assert_eq!(error.code, ValidationCode::Required);
        assert!(error.message.contains("required"));
    }

    #[test]
    fn test_validation_errors_add() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add_required("dateFrom");
        errors.add(FieldError::invalid_format("dateTo", "YYYY-MM-DD"));

        assert_eq!(errors.len(), 2);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_empty_errors_into_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_validation_errors_serialize() {
        let mut errors = ValidationErrors::new();
        errors.add_required("url");

        let json = serde_json::to_string(&errors).unwrap();
        assert!(json.contains("url"));
        assert!(json.contains("REQUIRED"));
    }

    #[test]
    fn test_by_field() {
        let mut errors = ValidationErrors::new();
        errors.add(FieldError::required("dateFrom"));
        errors.add(FieldError::invalid_format("dateFrom", "YYYY-MM-DD"));
        errors.add(FieldError::invalid_type("id", "an integer"));

        let grouped = errors.by_field();
        assert_eq!(grouped.get("dateFrom").map(Vec::len), Some(2));
        assert_eq!(grouped.get("id").map(Vec::len), Some(1));
    }
}
