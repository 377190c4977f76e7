//! API Routes

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::broadcast;
use crate::error::Error;
use crate::ingest;
use crate::models::StatusSnapshot;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Stream
        .route("/stream/push", get(ingest::push_handler))
        .route("/stream/live.mjpg", get(broadcast::live_handler))
        .route("/stream/snapshot.jpg", get(snapshot_handler))
        .route("/stream/status", get(status_handler))
        .with_state(state)
}

// ========================================
// Snapshot & Status Handlers
// ========================================

/// Serve exactly one current frame
///
/// Never blocks waiting for a frame to appear. With
/// `serve_stale_snapshot` disabled, a disconnected source yields 503
/// even though the last frame is retained.
async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.config.serve_stale_snapshot {
        let (source_connected, _) = state.source.snapshot().await;
        if !source_connected {
            return Error::NoFrame("push source is not connected".to_string()).into_response();
        }
    }

    match state.frames.get() {
        Some(frame) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            frame.data.clone(),
        )
            .into_response(),
        None => Error::NoFrame("no frame has been received".to_string()).into_response(),
    }
}

/// Report aggregate stream state
///
/// A pure read assembled at call time from the SourceTracker, the
/// FrameStore age and the ClientRegistry count.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (source_connected, source_id) = state.source.snapshot().await;

    Json(StatusSnapshot {
        source_connected,
        source_id,
        client_count: state.clients.count(),
        frame_age_seconds: state.frames.age(),
        has_frame: state.frames.has_frame(),
    })
}
