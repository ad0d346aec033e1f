use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use shellcast_core::BrokerConfig;
use shellcast_sessions::SessionManager;

/// Shared state handed to every Axum handler behind `Arc`.
pub struct AppState {
    pub config: BrokerConfig,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: BrokerConfig, sessions: SessionManager) -> Self {
        Self { config, sessions }
    }
}

/// Assemble the full router: the HTTP session surface plus the attach
/// WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sessions", get(crate::http::sessions::list_sessions))
        .route("/api/sessions", post(crate::http::sessions::create_session))
        .route(
            "/api/sessions/{id}",
            delete(crate::http::sessions::kill_session),
        )
        .route("/ws/terminal/{id}", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
