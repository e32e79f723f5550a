//! # runshift server
//!
//! Loads configuration, opens the database pool, optionally seeds the
//! catalog, and serves the race search API until Ctrl-C.

mod config;

use anyhow::Context;
use config::AppConfig;
use runshift_core::seed::load_json_file;
use runshift_core::{
    register_routes, CorsMiddleware, DatabasePool, LoggingMiddleware, RaceService, RaceStore,
    Server,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("runshift=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}

async fn seed_on_boot(config: &AppConfig, store: &RaceStore) -> anyhow::Result<()> {
    if !config.seed.on_boot {
        return Ok(());
    }
    let Some(path) = config.seed.path.as_deref() else {
        warn!("seed.on_boot is set but seed.path is empty; skipping seed");
        return Ok(());
    };
    let races = load_json_file(path)
        .await
        .with_context(|| format!("failed to read seed file {path}"))?;
    store.replace_all(&races).await.context("failed to seed catalog")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("failed to load configuration")?;
    let server_config = config.server.to_core()?;

    let pool = DatabasePool::connect(&config.database.url, config.database.pool_settings())
        .await
        .context("failed to connect to the database")?;
    info!(
        backend = pool.backend(),
        max_connections = config.database.max_connections,
        "Database pool ready"
    );
    pool.ensure_schema().await.context("failed to prepare schema")?;

    let store = RaceStore::new(pool.clone());
    seed_on_boot(&config, &store).await?;

    let service = Arc::new(RaceService::new(store, config.search.settings()));

    let mut server = Server::with_config(server_config);
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(CorsMiddleware::new().allow_origin(config.server.cors_origin.as_str()));
    register_routes(&mut server, service, config.server.expose_error_detail)?;

    let served = server.serve().await;

    pool.close().await;
    info!("Database pool closed");
    served.map_err(Into::into)
}
