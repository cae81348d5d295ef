//! Upstream Redis pub/sub subscription and its failure policy.
//!
//! The relay holds exactly one pattern subscription (`PSUBSCRIBE rc.*` by
//! default) for its whole lifetime. Losing it is fatal unless a reconnect
//! budget is configured, in which case the subscription is re-established
//! with exponential backoff.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};

use super::ingestor::{InboundMessage, Ingestor};
use crate::config::RelayConfig;
use crate::error::RelayError;

/// Upper bound for the delay between reconnect attempts.
pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Stream of raw upstream messages.
pub type UpstreamFeed = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// How the relay reacts to losing the upstream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive reconnects allowed before giving up. `0` means the first
    /// failure is fatal.
    pub max_attempts: u32,
    /// Delay before the first reconnect; doubled after every failed attempt
    /// up to [`MAX_RECONNECT_BACKOFF`].
    pub initial_backoff: Duration,
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    #[must_use]
    pub const fn fatal() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
        }
    }
}

impl From<&RelayConfig> for ReconnectPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.upstream_reconnect_attempts,
            initial_backoff: Duration::from_millis(config.upstream_reconnect_backoff_ms),
        }
    }
}

/// Opens a Redis pattern subscription and exposes it as an
/// [`UpstreamFeed`].
///
/// Payloads that are not valid UTF-8 are logged and skipped.
///
/// # Errors
///
/// Returns [`RelayError::Upstream`] if the URL is invalid, the server is
/// unreachable or the subscription is refused.
pub async fn subscribe(redis_url: &str, pattern: &str) -> Result<UpstreamFeed, RelayError> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(pattern).await?;
    tracing::info!(pattern, "subscribed to upstream feed");

    let feed = pubsub.into_on_message().filter_map(|msg| async move {
        let channel = msg.get_channel_name().to_string();
        match msg.get_payload::<String>() {
            Ok(payload) => Some(InboundMessage { channel, payload }),
            Err(err) => {
                tracing::warn!(%channel, error = %err, "dropping non-text upstream message");
                None
            }
        }
    });
    Ok(Box::pin(feed))
}

/// Runs the Redis ingestion loop configured by `config`.
///
/// # Errors
///
/// Returns the error that ended ingestion; see [`run_with_reconnect`].
pub async fn run_upstream(config: &RelayConfig, ingestor: &Ingestor) -> Result<(), RelayError> {
    let policy = ReconnectPolicy::from(config);
    run_with_reconnect(policy, ingestor, || {
        subscribe(&config.redis_url, &config.upstream_channel_pattern)
    })
    .await
}

/// Feeds `ingestor` from subscriptions produced by `connect`, applying
/// `policy` whenever a subscription fails or ends.
///
/// The failure counter and backoff reset once a subscription has delivered
/// at least one message.
///
/// # Errors
///
/// Never returns `Ok`. Returns [`RelayError::IngestQueueClosed`] at once if
/// the broadcaster stopped, otherwise the last upstream error after the
/// reconnect budget is exhausted.
pub async fn run_with_reconnect<C, Fut>(
    policy: ReconnectPolicy,
    ingestor: &Ingestor,
    mut connect: C,
) -> Result<(), RelayError>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<UpstreamFeed, RelayError>>,
{
    let mut failures: u32 = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        let mut received = false;
        let err = match connect().await {
            Ok(feed) => match ingestor.run(feed, || received = true).await {
                Ok(()) => RelayError::UpstreamClosed,
                Err(err) => err,
            },
            Err(err) => err,
        };

        if matches!(err, RelayError::IngestQueueClosed) {
            return Err(err);
        }
        if received {
            failures = 0;
            backoff = policy.initial_backoff;
        }
        if failures >= policy.max_attempts {
            tracing::error!(error = %err, "upstream feed lost");
            return Err(err);
        }

        failures += 1;
        tracing::warn!(
            error = %err,
            attempt = failures,
            max_attempts = policy.max_attempts,
            delay_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            "upstream feed lost; reconnecting"
        );
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2).min(MAX_RECONNECT_BACKOFF);
    }
}
