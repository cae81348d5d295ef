//! HTTP layer: route handlers, OpenAPI document and router composition.

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "rcstream-relay",
        description = "WebSocket relay for recent-changes events. Clients connect to `/rc` and subscribe to wildcard patterns over `server_name`."
    ),
    paths(handlers::system::health_handler, handlers::system::status_handler),
    tags((name = "System", description = "Health and operational status"))
)]
pub struct ApiDoc;

/// Builds the HTTP router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new().merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the complete application: REST endpoints, the `/rc` WebSocket
/// endpoint and the HTTP middleware stack.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/rc", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
