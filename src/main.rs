//! rcstream-relay server entry point.
//!
//! Starts the Axum HTTP/WebSocket server, the broadcaster task and the
//! upstream ingestion loop. Losing the upstream feed ends the process with
//! an error so that a supervisor can restart it.

use std::future::IntoFuture;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rcstream_relay::api;
use rcstream_relay::app_state::Relay;
use rcstream_relay::config::{LogFormat, RelayConfig};
use rcstream_relay::service::upstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        upstream = %config.redis_url,
        pattern = %config.upstream_channel_pattern,
        "starting rcstream-relay"
    );

    // Build relay core
    let Relay {
        state,
        ingestor,
        broadcaster,
        events,
    } = Relay::new(config.ingest_queue_capacity, config.pattern_cache_capacity);

    let broadcast_task = tokio::spawn(broadcaster.run(events));

    // Build router and bind
    let app = api::build_app(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let result = tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served.context("http server failed")
        }
        ingested = upstream::run_upstream(&config, &ingestor) => {
            ingested.context("upstream ingestion stopped")
        }
    };

    broadcast_task.abort();
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "shutting down");
    }
    result
}
