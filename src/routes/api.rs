use crate::{
    AppState,
    handlers::{diagnostics, health_check, ready_check},
    websocket::websocket_handler,
};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(app_state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .with_state(app_state)
}

/// Create the document relay routes
pub fn create_ws_routes(app_state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/ws/docs/:document_id", get(websocket_handler))
        .with_state(app_state)
}
