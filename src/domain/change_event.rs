//! Decoded upstream change events.
//!
//! Every message published on the upstream feed is a JSON object. The only
//! field the relay interprets is `server_name`, the routing key that client
//! patterns are matched against; the rest is forwarded to clients verbatim.

use std::sync::Arc;

use serde_json::Value;

use crate::error::RelayError;

/// Name of the payload field holding the routing key.
pub const ROUTING_KEY_FIELD: &str = "server_name";

/// One decoded upstream message.
///
/// Transient: built by the ingestor, consumed by a single broadcaster pass
/// and dropped. The payload sits behind an [`Arc`] so fanning out to many
/// connections never copies it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    routing_key: String,
    payload: Arc<Value>,
}

impl ChangeEvent {
    /// Decodes a raw upstream payload.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedEvent`] if `raw` is not a JSON object
    /// or has no string `server_name` field.
    pub fn decode(raw: &str) -> Result<Self, RelayError> {
        let payload: Value =
            serde_json::from_str(raw).map_err(|err| RelayError::MalformedEvent(err.to_string()))?;
        Self::from_value(payload)
    }

    /// Builds an event from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedEvent`] if `payload` is not an object
    /// or has no string `server_name` field.
    pub fn from_value(payload: Value) -> Result<Self, RelayError> {
        let Some(object) = payload.as_object() else {
            return Err(RelayError::MalformedEvent(
                "payload is not a JSON object".to_string(),
            ));
        };
        let routing_key = object
            .get(ROUTING_KEY_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RelayError::MalformedEvent(format!("missing string field `{ROUTING_KEY_FIELD}`"))
            })?
            .to_string();

        Ok(Self {
            routing_key,
            payload: Arc::new(payload),
        })
    }

    /// The site identifier used to select recipients.
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// The full decoded payload, shared.
    #[must_use]
    pub fn payload(&self) -> &Arc<Value> {
        &self.payload
    }
}
