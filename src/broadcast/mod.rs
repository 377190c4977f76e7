//! BroadcastServer - MJPEG Fan-out
//!
//! ## Responsibilities
//!
//! - Serve a continuous `multipart/x-mixed-replace` stream per viewer
//! - Register/deregister each viewer session in the ClientRegistry
//! - Coalesce frames for slow viewers (latest frame wins, no queue)
//!
//! Each viewer runs an independent loop against the FrameStore; a slow
//! viewer observes only the latest frame on its next wait and never
//! delays ingest or other viewers. When the viewer disconnects the
//! response body is dropped and the session guard deregisters it.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::Response,
};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream;
use std::convert::Infallible;

use crate::client_registry::SessionGuard;
use crate::error::{Error, Result};
use crate::frame_store::Frame;
use crate::state::AppState;

/// Part boundary of the multipart stream
const BOUNDARY: &str = "frame";

struct ViewerLoop {
    state: AppState,
    guard: SessionGuard,
    last_seq: u64,
}

/// Streaming handler for `GET /stream/live.mjpg`
///
/// Registration happens before the response starts so a full registry
/// rejects the viewer with 503 and no session is created. The stream
/// stays open while no frame exists yet and emits the first frame the
/// moment it arrives.
pub async fn live_handler(State(state): State<AppState>) -> Result<Response> {
    let guard = state.clients.clone().register()?;
    let session_id = guard.id();
    tracing::debug!(session_id = %session_id, "MJPEG stream starting");

    let viewer = ViewerLoop {
        state,
        guard,
        last_seq: 0,
    };

    let body = stream::unfold(viewer, |mut viewer| async move {
        loop {
            let next = viewer
                .state
                .frames
                .wait_for_next(viewer.last_seq, viewer.state.config.stream_idle_timeout)
                .await;

            match next {
                Some(frame) => {
                    viewer.last_seq = frame.seq;
                    viewer.guard.note_delivered(frame.seq);
                    let part = encode_part(&frame);
                    return Some((Ok::<Bytes, Infallible>(part), viewer));
                }
                // Idle timeout: re-poll. Idleness never closes the stream.
                None => continue,
            }
        }
    });

    let response = Response::builder()
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .body(Body::from_stream(body))
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(response)
}

/// Encode one frame as a multipart body part
fn encode_part(frame: &Frame) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.data.len()
    );
    let mut buf = BytesMut::with_capacity(header.len() + frame.data.len() + 2);
    buf.put(header.as_bytes());
    buf.put(frame.data.clone());
    buf.put(&b"\r\n"[..]);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(data: &'static [u8], seq: u64) -> Frame {
        Frame {
            data: Bytes::from_static(data),
            seq,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_part_framing() {
        let part = encode_part(&frame(b"\xff\xd8jpeg-bytes", 7));
        let text = String::from_utf8_lossy(&part);

        assert!(text.starts_with("--frame\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 12\r\n\r\n"));
        assert!(part.ends_with(b"\r\n"));
    }

    #[test]
    fn test_part_carries_raw_payload() {
        let part = encode_part(&frame(b"\xff\xd8\x00\x01\x02", 1));
        let header_end = part
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator")
            + 4;
        assert_eq!(&part[header_end..part.len() - 2], b"\xff\xd8\x00\x01\x02");
    }
}
