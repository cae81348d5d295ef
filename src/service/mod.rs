//! Service layer: the ingestion-to-broadcast pipeline and connection
//! lifecycle.
//!
//! [`Ingestor`] reads the upstream feed and fills the ingest queue,
//! [`Broadcaster`] drains it and fans events out, [`ConnectionLifecycle`]
//! applies session events to the registry and [`StatusReporter`] reads it.

pub mod broadcaster;
pub mod ingestor;
pub mod lifecycle;
pub mod status;
pub mod upstream;

pub use broadcaster::{Broadcaster, DeliveryReport};
pub use ingestor::{InboundMessage, Ingestor};
pub use lifecycle::ConnectionLifecycle;
pub use status::{StatusReporter, StatusSnapshot};
