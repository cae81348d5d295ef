//! # rcstream-relay
//!
//! WebSocket relay for a recent-changes event feed.
//!
//! A single upstream Redis pattern subscription (`rc.*`) delivers JSON
//! change events, each tagged with the site it came from (`server_name`).
//! Clients connect over WebSocket, subscribe to up to ten wildcard patterns
//! over site names (`"en*"`, `"*wiki"`, `"commonswiki"`) and receive every
//! event whose site matches one of their patterns.
//!
//! ## Architecture
//!
//! ```text
//! Redis PSUBSCRIBE rc.*
//!     │
//!     ├── Ingestor (service/)          decode, drop malformed
//!     ├── IngestQueue (domain/)        bounded FIFO
//!     ├── Broadcaster (service/)       match + fan-out
//!     │       │
//!     │       ├── PatternMatcher (domain/)       bounded matcher cache
//!     │       └── ConnectionRegistry (domain/)   live connections
//!     │
//! Clients (WebSocket /rc, HTTP /rcstream_status)
//!     ├── WS connection loop (ws/)     subscribe / unsubscribe
//!     ├── ConnectionLifecycle (service/)
//!     └── StatusReporter (service/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
