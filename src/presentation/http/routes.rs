//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, logging};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket endpoint; authentication happens in-band
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(logging::track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/chatrooms", chatroom_routes(state.clone()))
        .nest("/users", user_routes(state))
}

/// Chatroom routes (protected)
fn chatroom_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/{chat_type}/{chatroom_id}/messages",
            get(handlers::messages::get_messages).post(handlers::messages::send_message),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// User notification routes (protected)
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/@me/notifications",
            get(handlers::notifications::list_notifications)
                .post(handlers::notifications::create_own_notification),
        )
        .route(
            "/@me/notifications/{notification_id}/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/{user_id}/notifications",
            post(handlers::notifications::create_notification),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
