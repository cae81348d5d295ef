//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! registers it on open, applies subscribe/unsubscribe requests, drains
//! the connection's outbox into the socket and deregisters it on close.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::ClientMessage;
use crate::domain::ConnectionId;
use crate::error::RelayError;
use crate::service::ConnectionLifecycle;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads requests from the client and applies them to its subscriptions.
/// - Forwards everything queued on the connection's outbox to the client.
///
/// Returns when the client closes, the socket fails or a write fails; the
/// connection is removed from the registry in every case.
pub async fn run_connection(socket: WebSocket, lifecycle: Arc<ConnectionLifecycle>) {
    let (id, mut outbox) = match lifecycle.connect().await {
        Ok(registered) => registered,
        Err(err) => {
            tracing::error!(error = %err, "failed to register ws connection");
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(&text, id, &lifecycle).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(connection = %id, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Notification queued for this connection
            queued = outbox.recv() => {
                let Some(message) = queued else {
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(connection = %id, error = %err, "unserializable message");
                        continue;
                    }
                };
                if ws_tx.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
        }
    }

    lifecycle.disconnect(id).await;
    tracing::debug!(connection = %id, "ws connection closed");
}

/// Applies one text frame from the client. Frames that are not a valid
/// request are ignored.
async fn handle_text_message(text: &str, id: ConnectionId, lifecycle: &ConnectionLifecycle) {
    let request = match serde_json::from_str::<ClientMessage>(text) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(connection = %id, error = %err, "ignoring malformed request");
            return;
        }
    };

    let result = match request {
        ClientMessage::Subscribe(list) => lifecycle.subscribe(id, &list.into_patterns()).await,
        ClientMessage::Unsubscribe(list) => lifecycle.unsubscribe(id, &list.into_patterns()).await,
    };

    match result {
        // Already reported to the client as `subscribe_error`.
        Ok(()) | Err(RelayError::SubscriptionCapacityExceeded { .. }) => {}
        Err(err) => tracing::debug!(connection = %id, error = %err, "request failed"),
    }
}
