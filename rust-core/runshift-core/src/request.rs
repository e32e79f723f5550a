//! # HTTP Request
//!
//! Request wrapper decoupled from hyper: method, path, decoded query
//! parameters, headers, optional body.

use crate::error::{Error, Result};
use crate::router::Method;
use crate::types::ParamValue;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::Request;
use std::collections::HashMap;

/// Incoming HTTP request as seen by handlers and middleware
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    query_params: HashMap<String, String>,
    /// Typed path parameters
    pub typed_params: HashMap<String, ParamValue>,
    headers: hyper::HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    /// Create a request manually (tests, `Server::test_request`)
    ///
    /// `path` may carry a query string (`/api/races?page=2`).
    pub fn new(
        method: Method,
        path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            query_params: parse_query_string(query_string.as_deref()),
            typed_params: HashMap::new(),
            headers,
            body,
        }
    }

    /// Create from a hyper request, enforcing a body size limit
    ///
    /// # Errors
    ///
    /// `Error::PayloadTooLarge` when the declared or received body exceeds
    /// `max_body_size`.
    pub async fn from_hyper_with_limit(
        req: Request<hyper::body::Incoming>,
        method: Method,
        max_body_size: usize,
    ) -> Result<Self> {
        let uri = req.uri();
        let path = uri.path().to_string();
        let query_params = parse_query_string(uri.query());

        let headers = req.headers().clone();
        let declared_len = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(content_len) = declared_len {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let body = match BodyExt::collect(req.into_body()).await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.len() > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: bytes.len(),
                    });
                }
                Some(bytes)
            }
            Err(_) => None,
        };

        Ok(Self {
            method,
            path,
            query_params,
            typed_params: HashMap::new(),
            headers,
            body,
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Decoded query parameters (last value wins for duplicate keys)
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Single query parameter
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Parse query string into a map, URL-decoding keys and values
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Percent-decoding with `+` as space; invalid UTF-8 is replaced lossily
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let decoded = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_query_string(None).is_empty());
        assert!(parse_query_string(Some("")).is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("city=New+York&country=C%C3%B4te%20d%27Ivoire"));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
        assert_eq!(result.get("country"), Some(&"Côte d'Ivoire".to_string()));
    }

    #[test]
    fn test_key_without_value() {
        let result = parse_query_string(Some("q&page=2"));
        assert_eq!(result.get("q"), Some(&String::new()));
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
        assert_eq!(url_decode("50%"), "50%");
        assert_eq!(url_decode("%zz"), "%zz");
    }

    #[test]
    fn test_new_splits_query() {
        let req = ApiRequest::new(
            Method::Get,
            "/api/race?url=https%3A%2F%2Fexample.com%2Frome".to_string(),
            HashMap::new(),
            None,
        );
        assert_eq!(req.path, "/api/race");
        assert_eq!(req.query("url"), Some("https://example.com/rome"));
    }
}
