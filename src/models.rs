//! Shared response models
//!
//! Types shared across multiple modules to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Stream status projection returned by `GET /stream/status`
///
/// Computed on demand from SourceTracker, FrameStore and ClientRegistry;
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Whether a push source is currently connected
    pub source_connected: bool,
    /// Identifier of the connected source (null when none)
    pub source_id: Option<String>,
    /// Number of currently attached viewers
    pub client_count: u64,
    /// Age of the current frame in seconds (null when no frame)
    pub frame_age_seconds: Option<f64>,
    /// Whether any frame has been received
    pub has_frame: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub source_connected: bool,
    pub client_count: u64,
    pub frames_received: u64,
    pub frames_rejected: u64,
}
