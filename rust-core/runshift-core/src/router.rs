//! # Router
//!
//! Radix-trie based router using `matchit`.
//!
//! - Path parameter extraction (`/api/races/{id}`)
//! - Typed parameters (`/api/races/{id:int}`)
//! - HEAD requests are served by the matching GET route

use crate::error::{Error, Result};
use crate::route::RouteInfo;
use crate::types::{convert_param, ParamValue};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method; `None` for methods this server never routes
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with extracted and converted parameters
#[derive(Debug)]
pub struct Match<'a> {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Raw extracted path parameters
    pub params: HashMap<&'a str, &'a str>,
    /// Typed path parameters; failed conversions stay as strings
    pub typed_params: HashMap<String, ParamValue>,
}

impl Match<'_> {
    /// Get a typed parameter by name
    #[must_use]
    pub fn get_typed(&self, name: &str) -> Option<&ParamValue> {
        self.typed_params.get(name)
    }

    /// Get a parameter as i64
    ///
    /// `None` if the parameter is missing or did not parse as an integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.typed_params.get(name).and_then(ParamValue::as_int)
    }
}

/// Per-method storage for routes
#[derive(Clone)]
struct MethodRoutes {
    router: MatchitRouter<HandlerId>,
    routes: Vec<RouteInfo>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            router: MatchitRouter::new(),
            routes: Vec::new(),
        }
    }
}

/// HTTP router using a radix trie per method
#[derive(Clone)]
pub struct Router {
    method_routes: HashMap<Method, MethodRoutes>,
    next_handler_id: HandlerId,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_routes: HashMap::new(),
            next_handler_id: 0,
        }
    }

    /// Register a route with the given method and path pattern
    ///
    /// Returns the handler ID assigned to this route.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route.
    pub fn add_route(&mut self, method: Method, path: &str) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;

        let route_info = RouteInfo::new(handler_id, path);
        let method_routes = self
            .method_routes
            .entry(method)
            .or_insert_with(MethodRoutes::new);

        method_routes
            .router
            .insert(route_info.match_pattern.clone(), handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        method_routes.routes.push(route_info);
        self.next_handler_id += 1;

        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route<'a>(&'a self, method: Method, path: &'a str) -> Result<Match<'a>> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let lookup = if method == Method::Head {
            Method::Get
        } else {
            method
        };
        let method_routes = self.method_routes.get(&lookup).ok_or_else(not_found)?;

        let matched = method_routes.router.at(path).map_err(|_| not_found())?;
        let handler_id = *matched.value;

        let route_info = method_routes
            .routes
            .iter()
            .find(|r| r.handler_id == handler_id)
            .ok_or_else(not_found)?;

        let params: HashMap<&str, &str> = matched.params.iter().collect();

        let typed_params = params
            .iter()
            .map(|(name, value)| {
                let typed = convert_param(value, route_info.get_param_type(name))
                    .unwrap_or_else(|_| ParamValue::String((*value).to_string()));
                ((*name).to_string(), typed)
            })
            .collect();

        Ok(Match {
            handler_id,
            params,
            typed_params,
        })
    }

    /// Convenience method to add a GET route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn get(&mut self, path: &str) -> Result<HandlerId> {
        self.add_route(Method::Get, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_routing() {
        let mut router = Router::new();

        let id1 = router.get("/health").unwrap();
        let id2 = router.get("/api/races").unwrap();
        let id3 = router.add_route(Method::Post, "/api/races").unwrap();

        assert_eq!((id1, id2, id3), (0, 1, 2));

        let m = router.match_route(Method::Get, "/api/races").unwrap();
        assert_eq!(m.handler_id, 1);

        let m = router.match_route(Method::Post, "/api/races").unwrap();
        assert_eq!(m.handler_id, 2);
    }

    #[test]
    fn test_head_uses_get_route() {
        let mut router = Router::new();
        router.get("/health").unwrap();
        let m = router.match_route(Method::Head, "/health").unwrap();
        assert_eq!(m.handler_id, 0);
    }

    #[test]
    fn test_typed_int_parameter() {
        let mut router = Router::new();
        router.get("/api/races/{id:int}").unwrap();

        let m = router.match_route(Method::Get, "/api/races/123").unwrap();
        assert_eq!(m.params.get("id"), Some(&"123"));
        assert_eq!(m.get_int("id"), Some(123));
    }

    #[test]
    fn test_invalid_type_fallback_to_string() {
        let mut router = Router::new();
        router.get("/api/races/{id:int}").unwrap();

        let m = router.match_route(Method::Get, "/api/races/abc").unwrap();
        assert_eq!(
            m.get_typed("id"),
            Some(&ParamValue::String("abc".to_string()))
        );
        assert_eq!(m.get_int("id"), None);
    }

    #[test]
    fn test_route_not_found() {
        let router = Router::new();
        assert!(router.match_route(Method::Get, "/nonexistent").is_err());
    }

    #[test]
    fn test_method_not_registered() {
        let mut router = Router::new();
        router.get("/api/races").unwrap();
        assert!(router.match_route(Method::Post, "/api/races").is_err());
    }

    #[test]
    fn test_conflicting_route_rejected() {
        let mut router = Router::new();
        router.get("/api/races/{id}").unwrap();
        assert!(router.get("/api/races/{slug}").is_err());
    }
}
