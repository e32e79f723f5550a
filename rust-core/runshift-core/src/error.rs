//! # Error Handling
//!
//! Centralized error types for runshift core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Errors fall into three families: client input errors (4xx), storage
//! errors (503), and server plumbing errors (500). Soft projection errors
//! never reach this type; see `projection`.

use crate::validation::ValidationErrors;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for runshift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the runshift runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Parser or serializer message
        message: String,
    },

    /// Request input failed validation
    #[error("Invalid request: {0:?}")]
    Validation(ValidationErrors),

    /// Requested record does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing record
        what: String,
    },

    /// Data store unreachable, timed out, or rejected the query
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Error message from the database driver
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// HTTP status this error is reported with
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic, client-safe message for the `error` field of a response
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid request",
            Self::NotFound { .. } | Self::RouteNotFound { .. } => "Not found",
            Self::PayloadTooLarge { .. } => "Payload too large",
            Self::StorageUnavailable { .. } => "Storage unavailable",
            _ => "Internal server error",
        }
    }

    /// Whether this error was caused by the client
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let message = match &err {
            sqlx::Error::PoolTimedOut => "timed out waiting for a database connection".to_string(),
            sqlx::Error::PoolClosed => "database pool is closed".to_string(),
            other => other.to_string(),
        };
        Self::StorageUnavailable { message }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
