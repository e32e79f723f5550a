//! # HTTP Server
//!
//! HTTP/1.1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - Async request handling with Tokio runtime
//! - Graceful shutdown: stop accepting, drain in-flight connections
//! - Handler panics are contained to the request that caused them
//! - Network-free request execution for tests ([`Server::test_request`])

use crate::error::{Error, Result};
use crate::json::to_json;
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::router::{Match, Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub use crate::request::ApiRequest;

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// How long shutdown waits for in-flight connections
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
        }
    }
}

/// HTTP response produced by handlers and middleware
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl ApiResponse {
    /// JSON response from pre-serialized text
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Bodyless response with the given status
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::text("").with_status(status)
    }

    /// 200 response with `value` serialized as JSON
    ///
    /// A value that cannot be serialized becomes a 500.
    #[must_use]
    pub fn ok_json<T: Serialize>(value: &T) -> Self {
        match to_json(value) {
            Ok(body) => Self::json(body),
            Err(err) => Self::from_error(&err, false),
        }
    }

    /// `{error, detail?}` body with the error's status
    ///
    /// Validation failures always carry their field errors; `detail` (the
    /// internal error text) is only included when `expose_detail` is set.
    #[must_use]
    pub fn from_error(err: &Error, expose_detail: bool) -> Self {
        let mut body = json!({ "error": err.public_message() });
        if let Error::Validation(errors) = err {
            body["errors"] = serde_json::to_value(&errors.errors).unwrap_or(Value::Null);
        }
        if expose_detail {
            body["detail"] = Value::String(err.to_string());
        }
        Self::json(body.to_string()).with_status(err.status_code().as_u16())
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.retain(|k, _| !k.eq_ignore_ascii_case(key));
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// `Error::Serialization` if the body is not valid JSON.
    pub fn json_body(&self) -> Result<Value> {
        crate::json::parse_json(&self.body)
    }

    fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder().status(status);
        if !self.body.is_empty() {
            builder = builder.header("Content-Type", &self.content_type);
        }
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|err| {
                error!(error = %err, "Invalid response header");
                let mut fallback = Response::new(Full::new(Bytes::from_static(
                    br#"{"error":"Internal server error"}"#,
                )));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

/// Boxed handler future
pub type HandlerFuture = Pin<Box<dyn Future<Output = ApiResponse> + Send>>;

/// Handler function type (async)
///
/// The handler copies what it needs from the request before returning its
/// future; the future itself runs on its own task.
pub type Handler = Arc<dyn Fn(&ApiRequest, &Match<'_>) -> HandlerFuture + Send + Sync>;

/// HTTP server: router, handlers, middleware, listener
pub struct Server {
    config: ServerConfig,
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a server with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server with the given configuration
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            handlers: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route.
    pub fn add_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        let handler_id = self.router.add_route(method, path)?;
        debug_assert_eq!(handler_id, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Serve until Ctrl-C, then drain
    ///
    /// # Errors
    ///
    /// `Error::BindError` if the listener cannot be set up, `Error::Io` if
    /// accepting fails.
    pub async fn serve(&self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain for up to
    /// `shutdown_timeout`
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn serve_with_shutdown<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.config.address;
        let listener = bind_listener(addr).map_err(|source| Error::BindError {
            address: addr.to_string(),
            source,
        })?;

        info!(address = %addr, "Server listening");

        let router = Arc::new(self.router.clone());
        let handlers = Arc::new(self.handlers.clone());
        let middleware = Arc::new(self.middleware.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        tokio::pin!(signal);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = match accept_result {
                        Ok(conn) => conn,
                        Err(err) => {
                            warn!(error = %err, "Failed to accept connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    let router = router.clone();
                    let handlers = handlers.clone();
                    let middleware = middleware.clone();
                    let active = active.clone();

                    active.fetch_add(1, Ordering::SeqCst);
                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let router = router.clone();
                            let handlers = handlers.clone();
                            let middleware = middleware.clone();
                            async move {
                                let started = Instant::now();
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();

                                let response = handle_request(
                                    req,
                                    &router,
                                    &handlers,
                                    &middleware,
                                    remote_addr,
                                    max_body_size,
                                )
                                .await;

                                info!(
                                    remote = %remote_addr,
                                    method = %method,
                                    path = %path,
                                    status = response.status().as_u16(),
                                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                                    "Request served"
                                );
                                Ok::<_, hyper::Error>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            warn!(error = %err, "Error serving connection");
                        }
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        drop(listener);
        let timeout = self.config.shutdown_timeout;
        let drain = async {
            while active.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                remaining = active.load(Ordering::SeqCst),
                "Shutdown timeout reached with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a request directly, without the network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: String,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> ApiResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                let err = Error::PayloadTooLarge {
                    limit: self.config.max_body_size,
                    actual: b.len(),
                };
                return ApiResponse::from_error(&err, false);
            }
        }
        let mut req = ApiRequest::new(method, path, headers, body);
        req.set_header("x-client-ip", "test");

        process_request(&mut req, &self.router, &self.handlers, &self.middleware).await
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to install Ctrl-C handler; serving until killed");
        std::future::pending::<()>().await;
    }
}

/// Core request processing logic (network agnostic)
async fn process_request(
    req: &mut ApiRequest,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
) -> ApiResponse {
    if req.header("x-request-id").is_none() {
        let request_id = generate_request_id();
        req.set_header("x-request-id", &request_id);
    }

    let mut response = match middleware.run_before(req) {
        MiddlewareResult::Respond(resp) => resp,
        MiddlewareResult::Continue => dispatch(req, router, handlers).await,
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    middleware.run_after(req, &mut response);
    response
}

async fn dispatch(req: &mut ApiRequest, router: &Router, handlers: &[Handler]) -> ApiResponse {
    let path = req.path.clone();
    let Ok(matched) = router.match_route(req.method, &path) else {
        let err = Error::RouteNotFound {
            path: req.path.clone(),
        };
        return ApiResponse::from_error(&err, false);
    };
    req.typed_params.clone_from(&matched.typed_params);

    let Some(handler) = handlers.get(matched.handler_id) else {
        error!(handler_id = matched.handler_id, "Route has no handler");
        return ApiResponse::json(r#"{"error":"Internal server error"}"#).with_status(500);
    };

    let future = handler(req, &matched);
    match tokio::spawn(future).await {
        Ok(response) => response,
        Err(err) => {
            error!(
                method = %req.method,
                path = %req.path,
                error = %err,
                "Handler panicked"
            );
            ApiResponse::json(r#"{"error":"Internal server error"}"#).with_status(500)
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let Some(method) = Method::from_hyper(req.method()) else {
        return ApiResponse::json(r#"{"error":"Method not allowed"}"#)
            .with_status(405)
            .with_header("Allow", "GET, HEAD, POST, OPTIONS")
            .into_hyper();
    };

    let mut api_request = match ApiRequest::from_hyper_with_limit(req, method, max_body_size).await {
        Ok(r) => r,
        Err(err) => {
            if !err.is_client_error() {
                error!(error = %err, "Failed to read request");
            }
            return ApiResponse::from_error(&err, false).into_hyper();
        }
    };

    api_request.set_header("x-client-ip", &remote_addr.ip().to_string());
    process_request(&mut api_request, router, handlers, middleware)
        .await
        .into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
