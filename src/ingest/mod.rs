//! IngestEndpoint - Push Source Connection
//!
//! ## Responsibilities
//!
//! - Upgrade the authorized push connection to a WebSocket
//! - Validate each binary message and deposit frames in the FrameStore
//! - Detect staleness via a heartbeat timeout on the read loop
//! - Enforce last-connection-wins preemption through the SourceTracker
//!
//! A bad frame is dropped and counted; it never closes the connection
//! or reaches other sessions. Silence beyond the heartbeat timeout
//! clears the connected flag but keeps the socket open; the next valid
//! frame restores it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;

use crate::error::Error;
use crate::state::AppState;

/// JPEG SOI marker every valid payload must start with
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Query parameters of the push upgrade request
#[derive(Debug, Deserialize)]
pub struct PushParams {
    /// Shared secret (alternative to the x-stream-secret header)
    pub secret: Option<String>,
    /// Optional caller-chosen source identifier
    pub source_id: Option<String>,
}

/// WebSocket upgrade handler for `GET /stream/push`
pub async fn push_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<PushParams>,
    State(state): State<AppState>,
) -> Response {
    let presented = headers
        .get("x-stream-secret")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(params.secret);

    if presented.as_deref() != Some(state.config.stream_secret.as_str()) {
        tracing::warn!("Push connection rejected: invalid secret");
        return Error::Unauthorized("invalid stream secret".to_string()).into_response();
    }

    let source_id = params
        .source_id
        .unwrap_or_else(|| format!("push-{}", uuid::Uuid::new_v4()));

    ws.on_upgrade(move |socket| handle_push(socket, source_id, state))
}

/// Read loop of one push connection
async fn handle_push(mut socket: WebSocket, source_id: String, state: AppState) {
    let conn = state.source.connect(source_id.clone()).await;
    let heartbeat = state.config.heartbeat_timeout;

    loop {
        tokio::select! {
            _ = conn.cancel.cancelled() => {
                tracing::info!(source_id = %source_id, "Push connection superseded, closing");
                break;
            }
            received = tokio::time::timeout(heartbeat, socket.recv()) => {
                match received {
                    // Silence: mark stale but keep the socket open
                    Err(_) => {
                        state.source.mark_stale(conn.epoch).await;
                    }
                    Ok(None) => {
                        tracing::info!(source_id = %source_id, "Push connection closed by source");
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        tracing::warn!(source_id = %source_id, error = %e, "Push connection error");
                        break;
                    }
                    Ok(Some(Ok(Message::Binary(data)))) => {
                        let data = Bytes::from(data);
                        match validate_frame(&data, state.config.max_frame_bytes) {
                            Ok(()) => {
                                let seq = state.frames.put(data);
                                state.source.touch(conn.epoch).await;
                                tracing::trace!(source_id = %source_id, seq = seq, "Frame ingested");
                            }
                            Err(reason) => {
                                state.source.record_rejected();
                                tracing::warn!(
                                    source_id = %source_id,
                                    reason = %reason,
                                    "Frame rejected"
                                );
                            }
                        }
                    }
                    Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                        state.source.touch_seen(conn.epoch).await;
                    }
                    Ok(Some(Ok(Message::Close(_)))) => {
                        tracing::info!(source_id = %source_id, "Push connection close frame");
                        break;
                    }
                    Ok(Some(Ok(_))) => {
                        // Text frames are not part of the push protocol
                    }
                }
            }
        }
    }

    state.source.disconnect(conn.epoch).await;
}

/// Check a push payload before it is stored
///
/// Must start with the JPEG SOI marker and stay within the size bound.
fn validate_frame(data: &[u8], max_bytes: usize) -> Result<(), String> {
    if data.len() < JPEG_SOI.len() || data[..2] != JPEG_SOI {
        return Err("missing JPEG SOI marker".to_string());
    }
    if data.len() > max_bytes {
        return Err(format!("payload {} bytes exceeds limit {}", data.len(), max_bytes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_jpeg_accepted() {
        let payload = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert!(validate_frame(&payload, 1024).is_ok());
    }

    #[test]
    fn test_bad_marker_rejected() {
        assert!(validate_frame(b"PNG-not-jpeg", 1024).is_err());
        assert!(validate_frame(&[0xFF, 0xD9], 1024).is_err());
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(validate_frame(&[], 1024).is_err());
        assert!(validate_frame(&[0xFF], 1024).is_err());
    }

    #[test]
    fn test_oversize_rejected() {
        let mut payload = vec![0xFF, 0xD8];
        payload.extend(std::iter::repeat(0u8).take(100));
        assert!(validate_frame(&payload, 50).is_err());
        assert!(validate_frame(&payload, 200).is_ok());
    }
}
