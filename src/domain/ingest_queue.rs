//! FIFO hand-off between the ingestor and the broadcaster.
//!
//! [`IngestQueue`] wraps a bounded [`tokio::sync::mpsc`] channel. The
//! ingestor is the only producer and a single broadcaster task is the only
//! consumer, so events leave the queue in exactly the order they were
//! decoded from the upstream feed.

use tokio::sync::mpsc;

use super::ChangeEvent;
use crate::error::RelayError;

/// Producer side of the ingest queue.
///
/// Cheap to clone; the depth reported by [`IngestQueue::len`] is shared by
/// all clones.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<ChangeEvent>,
}

impl IngestQueue {
    /// Creates a queue holding at most `capacity` pending events and
    /// returns it with its receiving end.
    ///
    /// A `capacity` of zero is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueues an event, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::IngestQueueClosed`] if the receiver was
    /// dropped, i.e. the broadcaster is gone.
    pub async fn publish(&self, event: ChangeEvent) -> Result<(), RelayError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| RelayError::IngestQueueClosed)
    }

    /// Number of events waiting for the broadcaster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Returns `true` if no event is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
