use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use catalog_api::config::AppConfig;
use catalog_api::database::{MemoryStore, PgStore, RecordStore};
use catalog_api::server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    tracing::info!("Starting Catalog API in {:?} mode", config.environment);

    let store = open_store(&config).await?;
    let state = AppState::new(config, store.clone());

    if state.accounts.bootstrap(&state.config.bootstrap).await? {
        tracing::info!("bootstrap admin account created");
    }

    let bind_addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Catalog API listening on http://{} ({} store)", bind_addr, store.backend());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    tracing::info!("Catalog API stopped");
    Ok(())
}

/// Postgres when `DATABASE_URL` is configured, in-memory otherwise
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    if config.database.url.is_none() {
        tracing::warn!("DATABASE_URL not set, records are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
