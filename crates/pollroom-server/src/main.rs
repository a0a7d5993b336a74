//! # pollroom-server
//!
//! Live classroom polling server.
//!
//! This binary provides:
//! - **Poll sessions** with a countdown timer, one vote per participant and
//!   live result broadcasts
//! - **Chat room** with a bounded history replayed to new joiners
//! - **Roster and kick** for teacher moderation
//! - **REST API** (axum) for teacher login, poll history and health checks
//! - **WebSocket gateway** carrying the `{event, data}` protocol

mod api;
mod chat;
mod config;
mod coordinator;
mod error;
mod hub;
mod registry;
mod session;
mod ws;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pollroom_shared::constants::APP_NAME;
use pollroom_store::{PollStore, SqliteStore};

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pollroom_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the durable store
    // -----------------------------------------------------------------------
    let store = match &config.database_path {
        Some(path) => SqliteStore::open_at(path)
            .with_context(|| format!("opening database at {}", path.display()))?,
        None => SqliteStore::open_default().context("opening default database")?,
    };
    let store: Arc<dyn PollStore> = Arc::new(store);

    // Timers do not survive a restart; these polls stay active forever.
    match store.count_active_polls() {
        Ok(0) => {}
        Ok(orphans) => warn!(orphans, "Active polls left over from a previous run will not auto-close"),
        Err(e) => warn!(error = %e, "Could not count leftover active polls"),
    }

    // -----------------------------------------------------------------------
    // 4. Run the HTTP + WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState::new(store, config);
    let registry = app_state.coordinator.registry().clone();

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let live = registry.active_ids().await;
            info!(live_polls = live.len(), "Received Ctrl+C, shutting down");
            for id in live {
                warn!(poll = %id, "Poll still open at shutdown");
            }
        }
    }

    Ok(())
}
