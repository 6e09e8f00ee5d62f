//! Router assembly
//!
//! One listening surface: the WebSocket upgrade on `/`, the REST API under
//! `/api`, the unauthenticated health probe, optional static files, and a
//! permissive CORS layer that also answers `OPTIONS` preflights on every
//! route.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::backend::realtime::ws_handler;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;

/// Build the complete application router.
pub fn create_router(state: AppState) -> Router<()> {
    let router = Router::new()
        .route("/", axum::routing::get(ws_handler))
        .route("/health", axum::routing::get(health));

    let router = configure_api_routes(router);

    // Static assets are opt-in; realtime deployments often serve the client
    // from a CDN instead.
    let router = match &state.config.static_dir {
        Some(dir) => router.nest_service("/static", ServeDir::new(dir)),
        None => router,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Unauthenticated liveness probe.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found")
}
