//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Log verbosity is controlled separately
//! through `RUST_LOG`.

use std::net::SocketAddr;

use crate::error::RelayError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP/WebSocket server to.
    pub listen_addr: SocketAddr,

    /// Redis connection URL of the upstream feed.
    pub redis_url: String,

    /// Channel pattern subscribed to on the upstream feed.
    pub upstream_channel_pattern: String,

    /// Maximum number of decoded events waiting for the broadcaster.
    pub ingest_queue_capacity: usize,

    /// Maximum number of compiled patterns kept in the matcher cache.
    pub pattern_cache_capacity: u64,

    /// Consecutive upstream reconnects allowed (0 = exit on first failure).
    pub upstream_reconnect_attempts: u32,

    /// Initial delay between upstream reconnects, in milliseconds.
    pub upstream_reconnect_backoff_ms: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 10080)),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            upstream_channel_pattern: "rc.*".to_string(),
            ingest_queue_capacity: 10_000,
            pattern_cache_capacity: 10_000,
            upstream_reconnect_attempts: 0,
            upstream_reconnect_backoff_ms: 500,
            log_format: LogFormat::Pretty,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set. Calls
    /// `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] if `LISTEN_ADDR` is set but
    /// cannot be parsed, or a capacity is zero.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`RelayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr: SocketAddr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|err| RelayError::InvalidConfig(format!("LISTEN_ADDR {raw:?}: {err}")))?,
            None => defaults.listen_addr,
        };

        let redis_url = lookup("REDIS_URL").unwrap_or(defaults.redis_url);
        let upstream_channel_pattern =
            lookup("UPSTREAM_CHANNEL_PATTERN").unwrap_or(defaults.upstream_channel_pattern);

        let ingest_queue_capacity = parse_or(
            &lookup,
            "INGEST_QUEUE_CAPACITY",
            defaults.ingest_queue_capacity,
        );
        let pattern_cache_capacity = parse_or(
            &lookup,
            "PATTERN_CACHE_CAPACITY",
            defaults.pattern_cache_capacity,
        );
        if ingest_queue_capacity == 0 || pattern_cache_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "queue and cache capacities must be positive".to_string(),
            ));
        }

        let upstream_reconnect_attempts = parse_or(
            &lookup,
            "UPSTREAM_RECONNECT_ATTEMPTS",
            defaults.upstream_reconnect_attempts,
        );
        let upstream_reconnect_backoff_ms = parse_or(
            &lookup,
            "UPSTREAM_RECONNECT_BACKOFF_MS",
            defaults.upstream_reconnect_backoff_ms,
        );

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            listen_addr,
            redis_url,
            upstream_channel_pattern,
            ingest_queue_capacity,
            pattern_cache_capacity,
            upstream_reconnect_attempts,
            upstream_reconnect_backoff_ms,
            log_format,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
