//! Read-only operational snapshot.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ConnectionRegistry, IngestQueue};

/// Body of `GET /rcstream_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusSnapshot {
    /// Number of live client connections.
    pub connected_clients: usize,
    /// Events decoded but not yet broadcast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
}

/// Reports registry size and ingest queue depth without mutating either.
///
/// The two figures are read independently and may be momentarily
/// inconsistent with each other.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    registry: Arc<ConnectionRegistry>,
    queue: Option<IngestQueue>,
}

impl StatusReporter {
    /// Creates a reporter over `registry` and, if events are buffered,
    /// the ingest `queue`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, queue: Option<IngestQueue>) -> Self {
        Self { registry, queue }
    }

    /// Takes a snapshot of the current figures.
    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected_clients: self.registry.len().await,
            queue_size: self.queue.as_ref().map(IngestQueue::len),
        }
    }
}
