//! Axum router construction for the observer server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /` -- HTML status page
/// - `GET /ws/monitor` -- live monitor `WebSocket`
/// - `GET /api/status` -- counters
/// - `GET /api/events`, `GET /api/debugs` -- backlogs
/// - `POST /api/messages` -- message injection
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/monitor", get(ws::ws_monitor))
        .route("/api/status", get(handlers::status))
        .route("/api/events", get(handlers::list_events))
        .route("/api/debugs", get(handlers::list_debugs))
        .route("/api/messages", post(handlers::post_message))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
