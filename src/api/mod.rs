//! HTTP API module
//!
//! The mobile client drives the session through these endpoints; each one maps
//! to a single UI event.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/session",
            post(load_handler).get(session_handler).delete(leave_handler),
        )
        .route("/session/start", post(start_handler))
        .route("/session/pause", post(pause_handler))
        .route("/session/skip", post(skip_handler))
        .route("/session/abort", post(abort_handler))
        .route("/session/background", post(background_handler))
        .route("/session/foreground", post(foreground_handler))
        .route("/session/events", get(events_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
