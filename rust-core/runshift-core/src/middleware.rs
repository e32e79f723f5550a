//! # Middleware System
//!
//! Request/response interception around every handler. Middleware runs
//! before route matching, so it also sees requests that end in 404 and can
//! answer requests (like CORS preflights) that have no route at all.

use crate::request::ApiRequest;
use crate::router::Method;
use crate::server::ApiResponse;
use std::sync::Arc;
use tracing::{debug, info};

/// Middleware trait for request/response interception
///
/// Middlewares are called in order before the handler, and in reverse order after.
pub trait Middleware: Send + Sync {
    /// Called before route matching
    ///
    /// Returning [`MiddlewareResult::Respond`] skips the remaining
    /// middlewares and the handler.
    fn before_request(&self, _req: &ApiRequest) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the handler (or short-circuit) produced a response
    fn after_response(&self, _req: &ApiRequest, _res: &mut ApiResponse) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(ApiResponse),
}

/// Ordered middleware list shared by all connections
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Run `before_request` in order until one responds
    pub fn run_before(&self, req: &ApiRequest) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(res) = mw.before_request(req) {
                debug!(middleware = mw.name(), "Request answered by middleware");
                return MiddlewareResult::Respond(res);
            }
        }
        MiddlewareResult::Continue
    }

    /// Run `after_response` in reverse order
    pub fn run_after(&self, req: &ApiRequest, res: &mut ApiResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Request-id-tagged received/sent events
#[derive(Default)]
pub struct LoggingMiddleware {
    log_query: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log decoded query parameters
    #[must_use]
    pub const fn with_query(mut self) -> Self {
        self.log_query = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &ApiRequest) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        if self.log_query {
            debug!(
                method = %req.method,
                path = %req.path,
                query = ?req.query_map(),
                request_id = %request_id,
                "Request received"
            );
        } else {
            debug!(
                method = %req.method,
                path = %req.path,
                request_id = %request_id,
                "Request received"
            );
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &ApiRequest, res: &mut ApiResponse) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Cross-Origin Resource Sharing headers and preflight answers
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, HEAD, POST, OPTIONS".to_string(),
            allow_headers: "Content-Type".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// Create a new CORS middleware with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set allowed methods
    #[must_use]
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    /// Set allowed headers
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// Get the Access-Control-Allow-Origin header value
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn before_request(&self, req: &ApiRequest) -> MiddlewareResult {
        if req.method == Method::Options {
            return MiddlewareResult::Respond(ApiResponse::empty(204));
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, _req: &ApiRequest, res: &mut ApiResponse) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}
