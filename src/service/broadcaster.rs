//! Fan-out of decoded change events to matching connections.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{ChangeEvent, ConnectionRegistry, PatternMatcher};
use crate::ws::messages::ServerMessage;

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections whose patterns matched the routing key.
    pub matched: usize,
    /// Matched connections the event was queued to.
    pub delivered: usize,
    /// Matched connections whose writer had already gone away.
    pub failed: usize,
}

/// Delivers each event to every live connection with a matching pattern.
///
/// Delivery is fire-and-forget: the event is queued on each matching
/// connection's outbox without waiting, and a closed outbox only affects
/// that one connection.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    matcher: Arc<PatternMatcher>,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, matcher: Arc<PatternMatcher>) -> Self {
        Self { registry, matcher }
    }

    /// Delivers `event` to all connections subscribed to its routing key.
    pub async fn broadcast(&self, event: &ChangeEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let key = event.routing_key();

        for entry in self.registry.snapshot().await {
            let matched = {
                let subs = entry.subscriptions().await;
                !subs.is_empty() && self.matcher.match_any(key, subs.patterns())
            };
            if !matched {
                continue;
            }
            report.matched += 1;
            if entry.send(ServerMessage::Change(Arc::clone(event.payload()))) {
                report.delivered += 1;
            } else {
                report.failed += 1;
                tracing::debug!(connection = %entry.id(), "dropping change for closed connection");
            }
        }

        tracing::trace!(
            server_name = key,
            matched = report.matched,
            delivered = report.delivered,
            "change broadcast"
        );
        report
    }

    /// Drains the ingest queue in order until every producer is gone.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            let _ = self.broadcast(&event).await;
        }
        tracing::info!("ingest queue closed; broadcaster stopping");
    }
}
