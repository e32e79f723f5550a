//! # runshift Core
//!
//! Race catalog search backend: an HTTP server with a filter-query builder,
//! pagination, row projection, and SQLx storage underneath.
//!
//! ## Architecture
//!
//! A request flows `server` → `middleware` → `router` → `routes` →
//! `service`, which combines the `filter` builder, the `pagination`
//! resolver, the `store` executor and the `projection` step into one
//! response.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper
//! - `router` - Routing using matchit (radix trie)
//! - `route` - Route metadata and information
//! - `request` - HTTP request wrapper with headers and query parsing
//! - `middleware` - Request/response middleware (logging, CORS)
//! - `routes` - Catalog endpoints
//! - `service` - Search and lookup orchestration
//! - `filter` - Parameterized SQL predicate builder and ordering
//! - `pagination` - Page/limit resolution
//! - `projection` - Stored row to API shape
//! - `store` - Query execution against the pool
//! - `database` - SQLx pools (SQLite, PostgreSQL) and schema
//! - `model` - Row and import types
//! - `seed` - Import record normalization
//! - `json` - JSON parsing with simd-json
//! - `validation` - Structured validation errors
//! - `types` - Path parameter types and conversion
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod filter;
pub mod json;
pub mod middleware;
pub mod model;
pub mod pagination;
pub mod projection;
pub mod request;
pub mod route;
pub mod router;
pub mod routes;
pub mod seed;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use database::{DatabasePool, PoolSettings};
pub use error::{Error, Result};
pub use filter::{
    BindValue, DistanceCategory, FilterBuilder, RaceFilters, SearchRacesRequest, SortKey, SortOrder,
};
pub use json::{parse_json, to_json};
pub use middleware::{CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain};
pub use model::{NewRace, RaceRow, Surface};
pub use pagination::{Page, PageLimits};
pub use projection::{Race, RaceSummary};
pub use request::ApiRequest;
pub use route::RouteInfo;
pub use router::{Method, Router};
pub use routes::register_routes;
pub use server::{ApiResponse, Handler, Server, ServerConfig};
pub use service::{RacePage, RaceService, SearchSettings};
pub use store::{CatalogStats, RaceStore};
pub use types::{ParamType, ParamValue};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
