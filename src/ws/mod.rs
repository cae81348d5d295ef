//! WebSocket layer: connection handling, message framing, subscriptions.
//!
//! The WebSocket endpoint at `/rc` lets clients subscribe to wildcard
//! patterns over site identifiers and receive matching change events.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
