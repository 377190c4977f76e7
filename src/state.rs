//! Application state
//!
//! Holds the shared components and configuration

use crate::client_registry::ClientRegistry;
use crate::frame_store::FrameStore;
use crate::source_tracker::SourceTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Shared secret the push source must present at connect time
    pub stream_secret: String,
    /// Silence on the ingest channel longer than this marks the source stale
    pub heartbeat_timeout: Duration,
    /// Interval of the background staleness sweep
    pub sweep_interval: Duration,
    /// Maximum concurrent viewer sessions
    pub max_clients: u64,
    /// Maximum accepted frame payload size in bytes
    pub max_frame_bytes: usize,
    /// How long a viewer loop waits for a new frame before re-polling
    pub stream_idle_timeout: Duration,
    /// Serve the retained last frame after the source disconnects
    pub serve_stale_snapshot: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            stream_secret: std::env::var("STREAM_SECRET")
                .unwrap_or_else(|_| "raspberry-pi-secret".to_string()),
            heartbeat_timeout: Duration::from_secs(
                std::env::var("HEARTBEAT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
            ),
            max_clients: std::env::var("MAX_CLIENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),
            max_frame_bytes: std::env::var("MAX_FRAME_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            stream_idle_timeout: Duration::from_secs(
                std::env::var("STREAM_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
            serve_stale_snapshot: std::env::var("SERVE_STALE_SNAPSHOT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// FrameStore (current frame, ground truth)
    pub frames: Arc<FrameStore>,
    /// SourceTracker (push connection state)
    pub source: Arc<SourceTracker>,
    /// ClientRegistry (viewer session accounting)
    pub clients: Arc<ClientRegistry>,
    /// Process start time for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state from config
    pub fn new(config: AppConfig) -> Self {
        let clients = Arc::new(ClientRegistry::new(config.max_clients));
        Self {
            config,
            frames: Arc::new(FrameStore::new()),
            source: Arc::new(SourceTracker::new()),
            clients,
            started_at: Instant::now(),
        }
    }
}
