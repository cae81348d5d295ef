//! Concurrent store of live client connections.
//!
//! [`ConnectionRegistry`] maps each live [`ConnectionId`] to its
//! [`ConnectionEntry`]. The outer map sits behind a
//! [`tokio::sync::RwLock`]; each entry guards its own subscription list
//! with a second lock, so a subscribe on one connection never blocks a
//! broadcast scan of the others.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, mpsc};

use super::ConnectionId;
use crate::error::RelayError;
use crate::ws::messages::ServerMessage;
use crate::ws::subscription::SubscriptionStore;

/// State of one live connection.
///
/// Owned by the registry; other components only hold it transiently via
/// [`ConnectionRegistry::snapshot`] or [`ConnectionRegistry::get`].
#[derive(Debug)]
pub struct ConnectionEntry {
    id: ConnectionId,
    connected_at: DateTime<Utc>,
    subscriptions: RwLock<SubscriptionStore>,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionEntry {
    /// Creates an entry with no subscriptions, emitting into `outbox`.
    #[must_use]
    pub fn new(id: ConnectionId, outbox: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            connected_at: Utc::now(),
            subscriptions: RwLock::new(SubscriptionStore::new()),
            outbox,
        }
    }

    /// The connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the connection was accepted.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Read access to the subscription list.
    pub async fn subscriptions(&self) -> RwLockReadGuard<'_, SubscriptionStore> {
        self.subscriptions.read().await
    }

    /// Exclusive access to the subscription list. Readers never observe the
    /// list mid-mutation.
    pub async fn subscriptions_mut(&self) -> RwLockWriteGuard<'_, SubscriptionStore> {
        self.subscriptions.write().await
    }

    /// Copy of the current patterns, in subscription order.
    pub async fn patterns(&self) -> Vec<String> {
        self.subscriptions.read().await.patterns().to_vec()
    }

    /// Queues `message` for the connection's socket without waiting.
    ///
    /// Returns `false` if the connection's writer has already gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbox.send(message).is_ok()
    }
}

/// Central store of all live connections.
///
/// # Concurrency
///
/// - Lifecycle events take the write lock only to insert or remove.
/// - Broadcast scans and status reads take the read lock briefly and work
///   on a cloned snapshot.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new connection entry.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if a connection with the same id is
    /// already registered (should never happen with UUID v4).
    pub async fn insert(&self, entry: ConnectionEntry) -> Result<Arc<ConnectionEntry>, RelayError> {
        let id = entry.id;
        let mut map = self.connections.write().await;
        if map.contains_key(&id) {
            return Err(RelayError::Internal(format!(
                "connection {id} already registered"
            )));
        }
        let entry = Arc::new(entry);
        map.insert(id, Arc::clone(&entry));
        Ok(entry)
    }

    /// Returns the entry for a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConnectionNotFound`] if `id` is not live.
    pub async fn get(&self, id: ConnectionId) -> Result<Arc<ConnectionEntry>, RelayError> {
        let map = self.connections.read().await;
        map.get(&id)
            .cloned()
            .ok_or(RelayError::ConnectionNotFound(id))
    }

    /// Removes a connection, returning its entry if it was present.
    /// Removing an absent id is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionEntry>> {
        self.connections.write().await.remove(&id)
    }

    /// Returns the entries live at the moment of the call.
    ///
    /// Connections that come or go afterwards do not affect the returned
    /// list.
    pub async fn snapshot(&self) -> Vec<Arc<ConnectionEntry>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Returns `true` if `id` is live.
    #[cfg(test)]
    pub(crate) async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Returns the number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is live.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
