use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Template routes
        .route("/api/templates", get(handlers::templates::list_templates))
        .route("/api/templates/validate", post(handlers::templates::validate_template))
        .route("/api/templates/:id", get(handlers::templates::get_template))
        .route("/api/reload", post(handlers::templates::reload_templates))
        // WebSocket route
        .route("/api/ws", get(crate::ws_upgrade_handler))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
