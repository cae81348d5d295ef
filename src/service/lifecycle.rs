//! Connection lifecycle: connect, subscribe, unsubscribe, disconnect.
//!
//! Every transport session drives exactly one [`ConnectionLifecycle`]
//! sequence: `connect` once, any number of `subscribe`/`unsubscribe`, then
//! `disconnect`. A new connection always starts with no subscriptions.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::domain::{ConnectionEntry, ConnectionId, ConnectionRegistry, PatternMatcher};
use crate::error::RelayError;
use crate::ws::messages::ServerMessage;

/// Applies transport session events to the [`ConnectionRegistry`].
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    registry: Arc<ConnectionRegistry>,
    matcher: Arc<PatternMatcher>,
}

impl ConnectionLifecycle {
    /// Creates a lifecycle bound to a registry and the shared matcher.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, matcher: Arc<PatternMatcher>) -> Self {
        Self { registry, matcher }
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Registers a new connection with an empty subscription list.
    ///
    /// Returns the assigned id and the receiving end of the connection's
    /// outbox; the transport drains it into the socket.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] on an id collision.
    pub async fn connect(
        &self,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerMessage>), RelayError> {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        self.registry.insert(ConnectionEntry::new(id, outbox)).await?;
        tracing::debug!(connection = %id, "client connected");
        Ok((id, inbox))
    }

    /// Adds `patterns` to the connection's subscriptions.
    ///
    /// Patterns that cannot be compiled are skipped like non-string
    /// entries. A pattern is compiled into the shared cache only when it is
    /// about to be appended; entries left unprocessed by the capacity stop
    /// never reach the cache.
    ///
    /// # Errors
    ///
    /// - [`RelayError::ConnectionNotFound`] if the connection is gone.
    /// - [`RelayError::SubscriptionCapacityExceeded`] if the list was full;
    ///   a `subscribe_error` has then been queued to this connection only.
    pub async fn subscribe(&self, id: ConnectionId, patterns: &[String]) -> Result<(), RelayError> {
        let entry = self.registry.get(id).await?;
        let result = entry
            .subscriptions_mut()
            .await
            .add_accepted(patterns, |pattern| match self.matcher.compile(pattern) {
                Ok(_) => true,
                Err(err) => {
                    tracing::debug!(connection = %id, error = %err, "skipping pattern");
                    false
                }
            });
        match result {
            Ok(added) => {
                tracing::debug!(connection = %id, added, "subscribed");
                Ok(())
            }
            Err(RelayError::SubscriptionCapacityExceeded { limit }) => {
                let _ = entry.send(ServerMessage::subscribe_error(limit));
                tracing::info!(connection = %id, limit, "subscription limit reached");
                Err(RelayError::SubscriptionCapacityExceeded { limit })
            }
            Err(err) => Err(err),
        }
    }

    /// Removes `patterns` from the connection's subscriptions. Absent
    /// patterns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConnectionNotFound`] if the connection is gone.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        patterns: &[String],
    ) -> Result<(), RelayError> {
        let entry = self.registry.get(id).await?;
        let removed = entry.subscriptions_mut().await.remove(patterns);
        tracing::debug!(connection = %id, removed, "unsubscribed");
        Ok(())
    }

    /// Removes the connection from the registry. Returns `true` if it was
    /// live; repeated calls are harmless no-ops.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let Some(entry) = self.registry.remove(id).await else {
            return false;
        };
        let connected_secs = (Utc::now() - entry.connected_at()).num_seconds();
        tracing::debug!(connection = %id, connected_secs, "client disconnected");
        true
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::ws::subscription::MAX_SUBSCRIPTIONS;

    fn lifecycle() -> ConnectionLifecycle {
        ConnectionLifecycle::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(PatternMatcher::default()),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    async fn patterns_of(lc: &ConnectionLifecycle, id: ConnectionId) -> Vec<String> {
        let Ok(entry) = lc.registry().get(id).await else {
            panic!("connection should be live");
        };
        entry.patterns().await
    }

    #[tokio::test]
    async fn connect_starts_empty() {
        let lc = lifecycle();
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };
        assert!(patterns_of(&lc, id).await.is_empty());
        assert_eq!(lc.registry().len().await, 1);
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe() {
        let lc = lifecycle();
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };

        assert!(lc.subscribe(id, &strings(&["zz", "a*", "bb"])).await.is_ok());
        assert_eq!(patterns_of(&lc, id).await, strings(&["a*", "bb", "zz"]));

        assert!(lc.unsubscribe(id, &strings(&["bb", "nope"])).await.is_ok());
        assert_eq!(patterns_of(&lc, id).await, strings(&["a*", "zz"]));
    }

    #[tokio::test]
    async fn capacity_error_is_sent_to_that_connection_only() {
        let lc = lifecycle();
        let Ok((full, mut full_rx)) = lc.connect().await else {
            panic!("connect failed");
        };
        let Ok((_other, mut other_rx)) = lc.connect().await else {
            panic!("connect failed");
        };

        let ten: Vec<String> = (0..MAX_SUBSCRIPTIONS).map(|i| format!("p{i}")).collect();
        assert!(lc.subscribe(full, &ten).await.is_ok());
        let before = patterns_of(&lc, full).await;

        let result = lc.subscribe(full, &strings(&["eleventh"])).await;
        assert!(matches!(
            result,
            Err(RelayError::SubscriptionCapacityExceeded { limit: 10 })
        ));
        assert_eq!(patterns_of(&lc, full).await, before);

        let Ok(ServerMessage::SubscribeError(payload)) = full_rx.try_recv() else {
            panic!("expected subscribe_error");
        };
        assert_eq!(payload.limit, MAX_SUBSCRIPTIONS);
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_subscribe_leaves_pattern_cache_untouched() {
        let matcher = Arc::new(PatternMatcher::default());
        let lc = ConnectionLifecycle::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::clone(&matcher),
        );
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };

        let ten: Vec<String> = (0..MAX_SUBSCRIPTIONS).map(|i| format!("p{i}*")).collect();
        assert!(lc.subscribe(id, &ten).await.is_ok());
        let cached_before = matcher.cached_patterns();

        let junk: Vec<String> = (0..500).map(|i| format!("junk{i}*")).collect();
        assert!(matches!(
            lc.subscribe(id, &junk).await,
            Err(RelayError::SubscriptionCapacityExceeded { .. })
        ));
        assert_eq!(matcher.cached_patterns(), cached_before);
    }

    #[tokio::test]
    async fn uncompilable_pattern_is_skipped() {
        let lc = lifecycle();
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };
        let huge = "x*".repeat(500_000);
        assert!(lc.subscribe(id, &[huge, "en*".to_string()]).await.is_ok());
        assert_eq!(patterns_of(&lc, id).await, strings(&["en*"]));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let lc = lifecycle();
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };
        assert!(lc.disconnect(id).await);
        assert!(!lc.disconnect(id).await);
        assert!(lc.registry().is_empty().await);
    }

    #[tokio::test]
    async fn requests_after_disconnect_are_not_found() {
        let lc = lifecycle();
        let Ok((id, _rx)) = lc.connect().await else {
            panic!("connect failed");
        };
        let _ = lc.disconnect(id).await;
        assert!(matches!(
            lc.subscribe(id, &strings(&["en*"])).await,
            Err(RelayError::ConnectionNotFound(_))
        ));
        assert!(matches!(
            lc.unsubscribe(id, &strings(&["en*"])).await,
            Err(RelayError::ConnectionNotFound(_))
        ));
    }
}
