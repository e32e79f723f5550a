//! # Route Metadata
//!
//! Per-route information: original pattern, matchit pattern, parameter types.

use crate::router::HandlerId;
use crate::types::ParamType;
use std::collections::HashMap;

/// Route metadata containing handler and type information
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Unique handler identifier
    pub handler_id: HandlerId,
    /// Original path pattern (e.g., "/api/races/{id:int}")
    pub path_pattern: String,
    /// Normalized path for matchit (e.g., "/api/races/{id}")
    pub match_pattern: String,
    /// Parameter name to type mapping
    pub param_types: HashMap<String, ParamType>,
}

impl RouteInfo {
    /// Create a new `RouteInfo` from a path pattern
    ///
    /// Parses the pattern to extract parameter types and creates
    /// a normalized pattern for matchit routing.
    #[must_use]
    pub fn new(handler_id: HandlerId, path: &str) -> Self {
        let (match_pattern, param_types) = Self::parse_path_pattern(path);

        Self {
            handler_id,
            path_pattern: path.to_string(),
            match_pattern,
            param_types,
        }
    }

    /// Converts `{name:type}` to `{name}` for matchit and collects the types
    fn parse_path_pattern(path: &str) -> (String, HashMap<String, ParamType>) {
        let mut param_types = HashMap::new();
        let mut normalized_parts = Vec::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some((name, param_type)) = crate::types::parse_param_pattern(segment) {
                normalized_parts.push(format!("{{{name}}}"));
                param_types.insert(name, param_type);
            } else {
                normalized_parts.push(segment.to_string());
            }
        }

        let normalized = if normalized_parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", normalized_parts.join("/"))
        };

        (normalized, param_types)
    }

    /// Get the type for a parameter by name
    ///
    /// Returns `ParamType::String` if parameter not found
    #[must_use]
    pub fn get_param_type(&self, name: &str) -> ParamType {
        self.param_types.get(name).copied().unwrap_or_default()
    }
}
