//! Configuration for the runshift server.
//!
//! Sources, lowest priority first: built-in defaults, an optional
//! `runshift.toml` next to the working directory, then `RUNSHIFT_*`
//! environment variables with `__` between section and key
//! (`RUNSHIFT_SERVER__PORT`, `RUNSHIFT_DATABASE__URL`, ...). A bare
//! `DATABASE_URL` is honoured when `RUNSHIFT_DATABASE__URL` is unset.

use anyhow::Context;
use runshift_core::pagination::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};
use runshift_core::{PageLimits, PoolSettings, SearchSettings};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Include internal error text in error responses
    #[serde(default)]
    pub expose_error_detail: bool,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_body_size() -> usize {
    64 * 1024
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            expose_error_detail: false,
            cors_origin: default_cors_origin(),
        }
    }
}

impl ServerConfig {
    /// Listener settings for the core server
    pub fn to_core(&self) -> anyhow::Result<runshift_core::ServerConfig> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid server.host {:?}", self.host))?;
        Ok(runshift_core::ServerConfig {
            address: SocketAddr::new(ip, self.port),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            max_body_size: self.max_body_size,
        })
    }
}

/// Database pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    "sqlite:runshift.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections.max(1),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

/// Search policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    /// Reject searches without both `dateFrom` and `dateTo`
    #[serde(default)]
    pub require_date_window: bool,
}

const fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_limit() -> i64 {
    DEFAULT_MAX_PAGE_SIZE
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            require_date_window: false,
        }
    }
}

impl SearchConfig {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            limits: PageLimits::new(self.default_limit, self.max_limit),
            require_date_window: self.require_date_window,
        }
    }
}

/// Seed-on-boot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Replace the catalog from `path` at startup
    #[serde(default)]
    pub on_boot: bool,
    /// JSON array of import records
    #[serde(default)]
    pub path: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `runshift.toml`, and the environment
    pub fn load() -> anyhow::Result<Self> {
        let plain_database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|_| std::env::var("RUNSHIFT_DATABASE__URL").is_err());

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name("runshift").required(false))
            .add_source(
                config::Environment::with_prefix("RUNSHIFT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", plain_database_url)?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.search.default_limit, 24);
        assert_eq!(config.search.max_limit, 100);
        assert!(!config.seed.on_boot);
    }

    #[test]
    fn test_search_settings_are_capped() {
        let search = SearchConfig {
            default_limit: 50,
            max_limit: 5000,
            require_date_window: true,
        };
        let settings = search.settings();
        assert_eq!(settings.limits.max_size, 200);
        assert_eq!(settings.limits.default_size, 50);
        assert!(settings.require_date_window);
    }

    #[test]
    fn test_server_address() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(server.to_core().unwrap().address.to_string(), "127.0.0.1:9000");

        let bad = ServerConfig {
            host: "not-an-ip".into(),
            ..ServerConfig::default()
        };
        assert!(bad.to_core().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[search]\nrequire_date_window = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(config.search.require_date_window);
        assert_eq!(config.search.default_limit, 24);
        assert_eq!(config.server.port, 8080);
    }
}
