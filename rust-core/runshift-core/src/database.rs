//! # Database Module
//!
//! Bounded SQLx connection pools for SQLite and PostgreSQL, plus schema
//! bootstrap. The pool is created once at startup, shared by handlers,
//! and closed on shutdown.

use crate::error::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Pool sizing and wait policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum pool size
    pub max_connections: u32,
    /// How long a query waits for a free connection before failing
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

const SQLITE_SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS races (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        race_url TEXT UNIQUE,
        race_name TEXT NOT NULL,
        date DATE,
        location_city TEXT,
        location_country TEXT,
        region TEXT,
        distance_km REAL,
        distance_label TEXT,
        race_type TEXT,
        surface TEXT NOT NULL DEFAULT 'road',
        elevation_profile TEXT,
        elevation_gain_m INTEGER,
        certified BOOLEAN NOT NULL DEFAULT 0,
        typical_weather TEXT,
        nearest_airport TEXT,
        registration_status TEXT,
        registration_open_date TEXT,
        registration_close_date TEXT,
        registration_process TEXT,
        fee_range_eur TEXT,
        geo_lat REAL,
        geo_lon REAL,
        image_url TEXT,
        image_thumb_url TEXT,
        sources_json TEXT NOT NULL DEFAULT '[]',
        tags_json TEXT NOT NULL DEFAULT '[]',
        search_name TEXT,
        search_city TEXT,
        search_country TEXT,
        search_region TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS race_distances (
        race_id INTEGER NOT NULL REFERENCES races(id) ON DELETE CASCADE,
        km REAL NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_races_date ON races(date)",
    "CREATE INDEX IF NOT EXISTS idx_race_distances ON race_distances(race_id, km)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS races (
        id BIGSERIAL PRIMARY KEY,
        race_url TEXT UNIQUE,
        race_name TEXT NOT NULL,
        date DATE,
        location_city TEXT,
        location_country TEXT,
        region TEXT,
        distance_km DOUBLE PRECISION,
        distance_label TEXT,
        race_type TEXT,
        surface TEXT NOT NULL DEFAULT 'road',
        elevation_profile TEXT,
        elevation_gain_m BIGINT,
        certified BOOLEAN NOT NULL DEFAULT FALSE,
        typical_weather TEXT,
        nearest_airport TEXT,
        registration_status TEXT,
        registration_open_date TEXT,
        registration_close_date TEXT,
        registration_process TEXT,
        fee_range_eur TEXT,
        geo_lat DOUBLE PRECISION,
        geo_lon DOUBLE PRECISION,
        image_url TEXT,
        image_thumb_url TEXT,
        sources_json TEXT NOT NULL DEFAULT '[]',
        tags_json TEXT NOT NULL DEFAULT '[]',
        search_name TEXT,
        search_city TEXT,
        search_country TEXT,
        search_region TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS race_distances (
        race_id BIGINT NOT NULL REFERENCES races(id) ON DELETE CASCADE,
        km DOUBLE PRECISION NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_races_date ON races(date)",
    "CREATE INDEX IF NOT EXISTS idx_race_distances ON race_distances(race_id, km)",
];

/// Database connection pool supporting multiple backends
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl DatabasePool {
    /// Connect to the backend named by the URL scheme
    ///
    /// `sqlite:` URLs open SQLite, `postgres://` / `postgresql://` open
    /// PostgreSQL.
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` for unknown schemes or failed connects.
    pub async fn connect(url: &str, settings: PoolSettings) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Self::connect_sqlite(url, settings).await
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url, settings).await
        } else {
            Err(Error::StorageUnavailable {
                message: "unsupported database URL scheme".to_string(),
            })
        }
    }

    /// Connect to a SQLite database (e.g. `sqlite:races.db`, `sqlite::memory:`)
    ///
    /// The file is created if missing and foreign keys are enforced.
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the database cannot be opened.
    pub async fn connect_sqlite(url: &str, settings: PoolSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::StorageUnavailable {
                message: format!("SQLite connection failed: {e}"),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| Error::StorageUnavailable {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the server is unreachable.
    pub async fn connect_postgres(url: &str, settings: PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| Error::StorageUnavailable {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Backend name for logs
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Create tables and indexes if they do not exist
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if any DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        match self {
            Self::Sqlite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
            Self::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
        }
        info!(backend = self.backend(), "Schema ready");
        Ok(())
    }

    /// Trivial round trip used by readiness checks
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the store cannot answer.
    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}
