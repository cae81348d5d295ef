//! Domain layer: core types, pattern matching, connection registry and the
//! ingest queue.
//!
//! This module contains the relay's data model: connection identity, the
//! registry of live connections, decoded change events, the wildcard
//! pattern matcher with its bounded cache, and the FIFO queue that carries
//! events from the ingestor to the broadcaster.

pub mod change_event;
pub mod connection_id;
pub mod connection_registry;
pub mod ingest_queue;
pub mod pattern;

pub use change_event::ChangeEvent;
pub use connection_id::ConnectionId;
pub use connection_registry::{ConnectionEntry, ConnectionRegistry};
pub use ingest_queue::IngestQueue;
pub use pattern::{Matcher, PatternMatcher};
