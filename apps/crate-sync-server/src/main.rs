//! Crate Sync Server
//!
//! Change-log synchronization for a DJ media library shared across devices.
//! Devices push field-level changes and pull everything since a cursor.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate_sync_server::config::Config;
use crate_sync_server::db;
use crate_sync_server::routes;
use crate_sync_server::state::AppState;
use crate_sync_server::sync::{ChangeStore, MemoryChangeStore, StoreError, StoreKind, SyncService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crate_sync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    // Invalid values abort startup
    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting Crate Sync Server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize change store
    let store: Arc<dyn ChangeStore> = match db::open_store(&config.database).await {
        Ok(store) => store,
        Err(e @ StoreError::UnsupportedUrl(_)) => {
            return Err(e).context("Invalid DATABASE_URL");
        }
        Err(e) => {
            tracing::warn!("Failed to open durable store: {}. Falling back to memory", e);
            Arc::new(MemoryChangeStore::new())
        }
    };
    match config.database.url.as_deref() {
        Some(url) if store.kind() != StoreKind::Memory => {
            tracing::info!("Change store: {} at {}", store.kind().as_str(), db::redact(url));
        }
        _ => tracing::info!("Change store: memory"),
    }
    if config.auth.jwt_secret.is_some() {
        tracing::info!("Bearer token required on push");
    }

    // Create application state
    let sync = SyncService::new(store, config.database.store_timeout);
    let app_state = AppState::new(config.clone(), sync);

    // Build router
    let app = routes::app(app_state);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    tracing::info!("Crate Sync Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
