//! WebSocket message types exchanged on the `/rc` endpoint.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Add patterns to the connection's interest set.
    Subscribe(PatternList),
    /// Remove patterns from the connection's interest set.
    Unsubscribe(PatternList),
}

/// Pattern argument of a subscribe/unsubscribe request: a single string or
/// an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    /// A single pattern.
    One(String),
    /// Several patterns; non-string entries are dropped.
    Many(Vec<Value>),
    /// Anything else; treated as an empty list.
    Other(Value),
}

impl PatternList {
    /// Normalizes the argument into a list of patterns, keeping the given
    /// order and skipping every entry that is not a string.
    #[must_use]
    pub fn into_patterns(self) -> Vec<String> {
        match self {
            Self::One(pattern) => vec![pattern],
            Self::Many(values) => values
                .into_iter()
                .filter_map(|value| match value {
                    Value::String(pattern) => Some(pattern),
                    _ => None,
                })
                .collect(),
            Self::Other(_) => Vec::new(),
        }
    }
}

/// Server → client notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// An upstream change event, forwarded unmodified.
    Change(Arc<Value>),
    /// A subscribe request hit the per-connection pattern limit.
    SubscribeError(SubscribeErrorPayload),
}

impl ServerMessage {
    /// Builds the notification sent when a subscribe exceeds `limit`.
    #[must_use]
    pub fn subscribe_error(limit: usize) -> Self {
        Self::SubscribeError(SubscribeErrorPayload {
            message: format!("subscription limit of {limit} patterns reached"),
            limit,
        })
    }
}

/// Body of a `subscribe_error` notification.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscribeErrorPayload {
    /// Human-readable reason.
    pub message: String,
    /// Maximum number of patterns per connection.
    pub limit: usize,
}
