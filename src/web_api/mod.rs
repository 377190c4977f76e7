//! WebAPI - HTTP Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP routes (push, live stream, snapshot, status, health)
//! - Request validation
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (source_connected, _) = state.source.snapshot().await;
    let stats = state.source.stats();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        source_connected,
        client_count: state.clients.count(),
        frames_received: stats.frames_received,
        frames_rejected: stats.frames_rejected,
    };

    Json(response)
}
