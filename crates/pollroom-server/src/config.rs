//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use pollroom_shared::constants::{CHAT_HISTORY_CAPACITY, CHAT_REPLAY_LIMIT, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP / WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// Origin allowed by CORS. `None` allows any origin.
    /// Env: `FRONTEND_URL`
    pub frontend_url: Option<String>,

    /// Chat messages kept in memory.
    /// Env: `CHAT_HISTORY_CAPACITY`
    /// Default: `100`
    pub chat_history_capacity: usize,

    /// Chat messages replayed to a client joining the chat.
    /// Env: `CHAT_REPLAY_LIMIT`
    /// Default: `50`
    pub chat_replay_limit: usize,

    /// Outbound events queued per connection before a slow client starts
    /// missing events.
    /// Env: `CLIENT_QUEUE_CAPACITY`
    /// Default: `256`
    pub client_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            frontend_url: None,
            chat_history_capacity: CHAT_HISTORY_CAPACITY,
            chat_replay_limit: CHAT_REPLAY_LIMIT,
            client_queue_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(url) = lookup("FRONTEND_URL") {
            if !url.is_empty() {
                config.frontend_url = Some(url);
            }
        }

        if let Some(n) = positive(&lookup, "CHAT_HISTORY_CAPACITY") {
            config.chat_history_capacity = n;
        }

        if let Some(n) = positive(&lookup, "CHAT_REPLAY_LIMIT") {
            config.chat_replay_limit = n;
        }

        if let Some(n) = positive(&lookup, "CLIENT_QUEUE_CAPACITY") {
            config.client_queue_capacity = n;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Expected a positive integer, using default");
            None
        }
    }
}
