//! picam-relay
//!
//! Relay between one resource-constrained camera device and any number
//! of web viewers. The device pushes JPEG frames over a WebSocket; the
//! relay fans them out as MJPEG streams, single-frame snapshots and a
//! JSON status query.
//!
//! ## Architecture (6 Components)
//!
//! 1. FrameStore - single current frame, ground truth
//! 2. SourceTracker - push connection state, staleness, preemption
//! 3. ClientRegistry - viewer session accounting with guaranteed cleanup
//! 4. IngestEndpoint - authenticated WebSocket push channel
//! 5. BroadcastServer - per-viewer MJPEG serving loop
//! 6. WebAPI - snapshot, status and health endpoints
//!
//! ## Design Principles
//!
//! - Media flows one direction: source -> FrameStore -> viewers
//! - The writer never waits on readers; slow viewers coalesce
//! - Per-frame and per-client errors stay local to their session

pub mod broadcast;
pub mod client_registry;
pub mod error;
pub mod frame_store;
pub mod ingest;
pub mod models;
pub mod source_tracker;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
