//! System endpoints: health check and relay status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::service::StatusSnapshot;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /rcstream_status`: Connected clients and pending events.
#[utoipa::path(
    get,
    path = "/rcstream_status",
    tag = "System",
    summary = "Relay status",
    description = "Returns the number of connected WebSocket clients and the number of decoded events waiting to be broadcast.",
    responses(
        (status = 200, description = "Current relay status", body = StatusSnapshot),
    )
)]
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.status.snapshot().await))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rcstream_status", get(status_handler))
}
