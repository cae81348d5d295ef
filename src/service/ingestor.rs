//! Single reader of the upstream feed.
//!
//! The [`Ingestor`] decodes raw upstream messages and hands the resulting
//! [`ChangeEvent`]s to the broadcaster through the [`IngestQueue`], one at
//! a time and in arrival order.

use futures_util::{Stream, StreamExt};

use crate::domain::{ChangeEvent, IngestQueue};
use crate::error::RelayError;

/// A raw message as delivered by the upstream pub/sub client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message was published on (e.g. `rc.enwiki`).
    pub channel: String,
    /// Undecoded payload.
    pub payload: String,
}

impl InboundMessage {
    /// Creates a message from channel name and payload.
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Decodes upstream messages and forwards them to the broadcaster.
#[derive(Debug, Clone)]
pub struct Ingestor {
    queue: IngestQueue,
}

impl Ingestor {
    /// Creates an ingestor feeding `queue`.
    #[must_use]
    pub fn new(queue: IngestQueue) -> Self {
        Self { queue }
    }

    /// Decodes one message and enqueues it.
    ///
    /// Returns `true` if the message was forwarded, `false` if it was
    /// malformed and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::IngestQueueClosed`] if the broadcaster is gone.
    pub async fn ingest(&self, message: InboundMessage) -> Result<bool, RelayError> {
        match ChangeEvent::decode(&message.payload) {
            Ok(event) => {
                tracing::trace!(
                    channel = %message.channel,
                    server_name = event.routing_key(),
                    "change received"
                );
                self.queue.publish(event).await?;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(channel = %message.channel, error = %err, "dropping upstream message");
                Ok(false)
            }
        }
    }

    /// Consumes `feed` until it ends.
    ///
    /// `on_message` is invoked after every received message, decoded or
    /// not; the upstream reconnect policy uses it to notice a healthy
    /// subscription.
    ///
    /// # Errors
    ///
    /// Always returns an error: [`RelayError::UpstreamClosed`] when the
    /// feed ends, or [`RelayError::IngestQueueClosed`] if the broadcaster
    /// stopped.
    pub async fn run<S, F>(&self, mut feed: S, mut on_message: F) -> Result<(), RelayError>
    where
        S: Stream<Item = InboundMessage> + Unpin,
        F: FnMut(),
    {
        while let Some(message) = feed.next().await {
            self.ingest(message).await?;
            on_message();
        }
        Err(RelayError::UpstreamClosed)
    }
}
