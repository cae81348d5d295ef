//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{ChangeEvent, ConnectionRegistry, IngestQueue, PatternMatcher};
use crate::service::{Broadcaster, ConnectionLifecycle, Ingestor, StatusReporter};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection lifecycle driven by WebSocket sessions.
    pub lifecycle: Arc<ConnectionLifecycle>,
    /// Status reporter behind `/rcstream_status`.
    pub status: Arc<StatusReporter>,
}

/// The wired-up relay core: one registry and matcher shared by every
/// component.
#[derive(Debug)]
pub struct Relay {
    /// State handed to the HTTP router.
    pub state: AppState,
    /// Producer side of the pipeline; feed it from the upstream client.
    pub ingestor: Ingestor,
    /// Consumer side of the pipeline; run it on its own task.
    pub broadcaster: Broadcaster,
    /// Receiving end of the ingest queue, for [`Broadcaster::run`].
    pub events: mpsc::Receiver<ChangeEvent>,
}

impl Relay {
    /// Builds the relay core with the given queue and cache capacities.
    #[must_use]
    pub fn new(ingest_queue_capacity: usize, pattern_cache_capacity: u64) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let matcher = Arc::new(PatternMatcher::new(pattern_cache_capacity));
        let (queue, events) = IngestQueue::new(ingest_queue_capacity);

        let lifecycle = Arc::new(ConnectionLifecycle::new(
            Arc::clone(&registry),
            Arc::clone(&matcher),
        ));
        let status = Arc::new(StatusReporter::new(
            Arc::clone(&registry),
            Some(queue.clone()),
        ));

        Self {
            state: AppState { lifecycle, status },
            ingestor: Ingestor::new(queue),
            broadcaster: Broadcaster::new(registry, matcher),
            events,
        }
    }
}
