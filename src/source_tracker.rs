//! Source Tracker
//!
//! Tracks the state of the single push source: connection status,
//! identifier, last-seen time and the cancellation token of the active
//! ingest connection. At most one source is connected at any instant;
//! a new connection supersedes the previous one (last-connection-wins,
//! only one physical camera is expected).
//!
//! Staleness is detected two ways: the ingest loop's own heartbeat
//! timeout, and the periodic [`SourceTracker::sweep`] which flips the
//! connected flag even while a socket read is still pending.
//!
//! State updates are keyed on a per-connection epoch, not the
//! caller-supplied id: a camera reconnecting under the same id gets a
//! fresh epoch, so the preempted loop's late writes cannot touch the
//! new connection's state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SourceInner {
    connected: bool,
    source_id: Option<String>,
    epoch: u64,
    last_seen: Option<Instant>,
    cancel: Option<CancellationToken>,
}

/// Identity of one accepted push connection
///
/// The epoch is unique per connection and must accompany every state
/// update made on its behalf.
#[derive(Debug, Clone)]
pub struct SourceConn {
    pub epoch: u64,
    pub cancel: CancellationToken,
}

/// Ingest counters exposed for observability
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceStats {
    pub frames_received: u64,
    pub frames_rejected: u64,
}

/// Tracks the push source connection state
pub struct SourceTracker {
    inner: RwLock<SourceInner>,
    frames_received: AtomicU64,
    frames_rejected: AtomicU64,
}

impl SourceTracker {
    /// Create new tracker
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SourceInner::default()),
            frames_received: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
        }
    }

    /// Register a new push connection, superseding any previous one
    ///
    /// Cancels the prior connection's token so its read loop exits, and
    /// assigns a fresh epoch. Returns the connection identity the new
    /// loop must use for every subsequent update.
    pub async fn connect(&self, source_id: String) -> SourceConn {
        let mut inner = self.inner.write().await;

        if let Some(prev) = inner.cancel.take() {
            tracing::warn!(
                prev_source = ?inner.source_id,
                new_source = %source_id,
                "Push source superseded by new connection"
            );
            prev.cancel();
        } else {
            tracing::info!(source_id = %source_id, "Push source connected");
        }

        let token = CancellationToken::new();
        inner.epoch += 1;
        inner.connected = true;
        inner.source_id = Some(source_id);
        inner.last_seen = Some(Instant::now());
        inner.cancel = Some(token.clone());
        SourceConn {
            epoch: inner.epoch,
            cancel: token,
        }
    }

    /// Record a valid frame from the source
    ///
    /// Updates last-seen and restores the connected flag if a staleness
    /// check had cleared it.
    pub async fn touch(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            return;
        }
        inner.last_seen = Some(Instant::now());
        if !inner.connected {
            inner.connected = true;
            tracing::info!(source_id = ?inner.source_id, "Push source recovered");
        }
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol-level heartbeat (ping/pong) from the source
    pub async fn touch_seen(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch == epoch {
            inner.last_seen = Some(Instant::now());
        }
    }

    /// Mark the source stale after a heartbeat timeout
    ///
    /// The frame data in the FrameStore is retained and the socket stays
    /// open; only the connected flag is cleared.
    pub async fn mark_stale(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch == epoch && inner.connected {
            inner.connected = false;
            tracing::warn!(
                source_id = ?inner.source_id,
                "Push source stale (heartbeat timeout)"
            );
        }
    }

    /// Deregister the source when its connection closes
    ///
    /// A no-op if a newer connection has already taken a fresh epoch, so
    /// a preempted loop exiting late cannot clobber the new source, even
    /// when the camera reconnected under the same id.
    pub async fn disconnect(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch == epoch {
            tracing::info!(source_id = ?inner.source_id, "Push source disconnected");
            inner.connected = false;
            inner.source_id = None;
            inner.cancel = None;
        }
    }

    /// Periodic staleness check
    ///
    /// Flips connected to false when the last message is older than the
    /// heartbeat timeout. Returns true when a transition occurred.
    pub async fn sweep(&self, heartbeat_timeout: Duration) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.connected {
            return false;
        }
        let stale = inner
            .last_seen
            .map(|seen| seen.elapsed() > heartbeat_timeout)
            .unwrap_or(true);
        if stale {
            inner.connected = false;
            tracing::warn!(
                source_id = ?inner.source_id,
                "Push source marked stale by sweep"
            );
        }
        stale
    }

    /// Current (connected, source_id) pair for status queries
    pub async fn snapshot(&self) -> (bool, Option<String>) {
        let inner = self.inner.read().await;
        (inner.connected, inner.source_id.clone())
    }

    /// Count one rejected (malformed/oversize) frame
    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Ingest counters
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for SourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_marks_connected() {
        let tracker = SourceTracker::new();
        tracker.connect("src-1".to_string()).await;
        let (connected, id) = tracker.snapshot().await;
        assert!(connected);
        assert_eq!(id.as_deref(), Some("src-1"));
    }

    #[tokio::test]
    async fn test_second_connect_cancels_first() {
        let tracker = SourceTracker::new();
        let first = tracker.connect("src-1".to_string()).await;
        let second = tracker.connect("src-2".to_string()).await;

        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert_ne!(first.epoch, second.epoch);

        let (connected, id) = tracker.snapshot().await;
        assert!(connected);
        assert_eq!(id.as_deref(), Some("src-2"));
    }

    #[tokio::test]
    async fn test_superseded_disconnect_is_noop() {
        let tracker = SourceTracker::new();
        let first = tracker.connect("src-1".to_string()).await;
        tracker.connect("src-2".to_string()).await;

        // The preempted loop exits late and tries to deregister
        tracker.disconnect(first.epoch).await;

        let (connected, id) = tracker.snapshot().await;
        assert!(connected);
        assert_eq!(id.as_deref(), Some("src-2"));
    }

    #[tokio::test]
    async fn test_same_id_reconnect_keeps_new_connection() {
        let tracker = SourceTracker::new();
        let first = tracker.connect("cam".to_string()).await;
        let second = tracker.connect("cam".to_string()).await;

        // The preempted loop deregisters late, then the new loop delivers
        tracker.disconnect(first.epoch).await;
        tracker.touch(second.epoch).await;

        let (connected, id) = tracker.snapshot().await;
        assert!(connected, "second connection should still be connected");
        assert_eq!(id.as_deref(), Some("cam"));
        assert_eq!(tracker.stats().frames_received, 1);

        // And a third connection can still preempt the second
        tracker.connect("cam".to_string()).await;
        assert!(second.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_disconnect_clears_state() {
        let tracker = SourceTracker::new();
        let conn = tracker.connect("src-1".to_string()).await;
        tracker.disconnect(conn.epoch).await;

        let (connected, id) = tracker.snapshot().await;
        assert!(!connected);
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_stale_then_touch_recovers() {
        let tracker = SourceTracker::new();
        let conn = tracker.connect("src-1".to_string()).await;
        tracker.mark_stale(conn.epoch).await;

        let (connected, id) = tracker.snapshot().await;
        assert!(!connected);
        assert_eq!(id.as_deref(), Some("src-1"));

        tracker.touch(conn.epoch).await;
        let (connected, _) = tracker.snapshot().await;
        assert!(connected);
    }

    #[tokio::test]
    async fn test_sweep_flips_stale_source() {
        let tracker = SourceTracker::new();
        tracker.connect("src-1".to_string()).await;

        assert!(!tracker.sweep(Duration::from_secs(60)).await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(tracker.sweep(Duration::from_millis(10)).await);

        let (connected, _) = tracker.snapshot().await;
        assert!(!connected);
    }

    #[tokio::test]
    async fn test_frame_counters() {
        let tracker = SourceTracker::new();
        let conn = tracker.connect("src-1".to_string()).await;
        tracker.touch(conn.epoch).await;
        tracker.touch(conn.epoch).await;
        tracker.record_rejected();

        let stats = tracker.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_rejected, 1);
    }

    #[tokio::test]
    async fn test_touch_from_superseded_connection_ignored() {
        let tracker = SourceTracker::new();
        let first = tracker.connect("src-1".to_string()).await;
        tracker.connect("src-2".to_string()).await;
        tracker.touch(first.epoch).await;
        assert_eq!(tracker.stats().frames_received, 0);
    }
}
