//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Most variants
//! never reach a client: they are logged and the offending message is
//! dropped. The current HTTP routes are infallible; the [`IntoResponse`]
//! mapping to a structured JSON body is there for fallible endpoints
//! added later.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ConnectionId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3000,
///     "message": "internal error: ..."
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Client request        | 400 / 404 / 409           |
/// | 2000–2999 | Upstream feed         | 502 Bad Gateway           |
/// | 3000–3999 | Server                | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The connection already holds the maximum number of patterns.
    #[error("subscription limit of {limit} patterns reached")]
    SubscriptionCapacityExceeded {
        /// Maximum number of distinct patterns per connection.
        limit: usize,
    },

    /// The pattern could not be compiled into a matcher.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Reason reported by the regex engine.
        reason: String,
    },

    /// No live connection with the given identifier.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Upstream payload could not be decoded into a change event.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The broadcaster stopped draining the ingest queue.
    #[error("ingest queue closed")]
    IngestQueueClosed,

    /// The upstream subscription ended.
    #[error("upstream feed closed")]
    UpstreamClosed,

    /// Error reported by the upstream Redis client.
    #[error("upstream error: {0}")]
    Upstream(#[from] redis::RedisError),

    /// Configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::SubscriptionCapacityExceeded { .. } => 1001,
            Self::InvalidPattern { .. } => 1002,
            Self::ConnectionNotFound(_) => 1003,
            Self::MalformedEvent(_) => 2001,
            Self::UpstreamClosed => 2002,
            Self::Upstream(_) => 2003,
            Self::IngestQueueClosed => 3001,
            Self::InvalidConfig(_) => 3002,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPattern { .. } => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::SubscriptionCapacityExceeded { .. } => StatusCode::CONFLICT,
            Self::MalformedEvent(_) | Self::UpstreamClosed | Self::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::IngestQueueClosed | Self::InvalidConfig(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
