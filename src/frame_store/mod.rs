//! FrameStore - Current Frame Holder
//!
//! ## Responsibilities
//!
//! - Hold the single most-recent frame and its metadata
//! - Wake waiting viewers when a new frame arrives
//! - Report frame age for status queries
//!
//! ## Design
//!
//! - One writer (ingest), many readers (viewers/snapshot)
//! - Copy-on-replace: a new `Arc<Frame>` swaps in whole, shared bytes
//!   are never mutated
//! - `put` never blocks on the presence or speed of readers; slow
//!   readers coalesce to the latest frame on their next wait

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// One frame of the live feed
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG payload
    pub data: Bytes,
    /// Sequence number, strictly increasing for the process lifetime
    pub seq: u64,
    /// Arrival timestamp
    pub captured_at: DateTime<Utc>,
}

/// Holds the current frame and notifies waiters on replacement
pub struct FrameStore {
    tx: watch::Sender<Option<Arc<Frame>>>,
    next_seq: AtomicU64,
}

impl FrameStore {
    /// Create an empty FrameStore
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            next_seq: AtomicU64::new(1),
        }
    }

    /// Store a new frame, assigning the next sequence number
    ///
    /// Atomically replaces the current frame and wakes every waiter.
    /// Returns the assigned sequence number.
    pub fn put(&self, data: Bytes) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let frame = Arc::new(Frame {
            data,
            seq,
            captured_at: Utc::now(),
        });
        self.tx.send_replace(Some(frame));
        tracing::trace!(seq = seq, "Frame stored");
        seq
    }

    /// Get the current frame without blocking
    pub fn get(&self) -> Option<Arc<Frame>> {
        self.tx.borrow().clone()
    }

    /// Wait until a frame with `seq > after_seq` exists
    ///
    /// Returns `None` when the timeout elapses first. A reader that
    /// fell behind several frames observes only the latest one.
    pub async fn wait_for_next(
        &self,
        after_seq: u64,
        timeout: Duration,
    ) -> Option<Arc<Frame>> {
        let mut rx = self.tx.subscribe();
        let wait = rx.wait_for(|f| f.as_ref().is_some_and(|frame| frame.seq > after_seq));
        let frame = match tokio::time::timeout(timeout, wait).await {
            // The sender lives as long as self, so wait_for cannot fail
            Ok(result) => result.ok().and_then(|guard| (*guard).clone()),
            Err(_) => None,
        };
        frame
    }

    /// Whether any frame has been received
    pub fn has_frame(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Sequence number of the current frame (0 when empty)
    pub fn current_seq(&self) -> u64 {
        self.tx.borrow().as_ref().map(|f| f.seq).unwrap_or(0)
    }

    /// Seconds elapsed since the current frame arrived
    ///
    /// `None` when no frame has been received.
    pub fn age(&self) -> Option<f64> {
        self.tx.borrow().as_ref().map(|f| {
            let elapsed = Utc::now() - f.captured_at;
            (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
        })
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store() {
        let store = FrameStore::new();
        assert!(store.get().is_none());
        assert!(!store.has_frame());
        assert_eq!(store.current_seq(), 0);
        assert!(store.age().is_none());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = FrameStore::new();
        let seq = store.put(Bytes::from_static(b"\xff\xd8frame-1"));
        assert_eq!(seq, 1);

        let frame = store.get().expect("frame should exist");
        assert_eq!(frame.data.as_ref(), b"\xff\xd8frame-1");
        assert_eq!(frame.seq, 1);
        assert!(store.has_frame());
        assert!(store.age().unwrap() < 1.0);
    }

    #[tokio::test]
    async fn test_sequence_strictly_increases() {
        let store = FrameStore::new();
        let s1 = store.put(Bytes::from_static(b"a"));
        let s2 = store.put(Bytes::from_static(b"b"));
        let s3 = store.put(Bytes::from_static(b"c"));
        assert!(s1 < s2 && s2 < s3);
        assert_eq!(store.current_seq(), s3);
    }

    #[tokio::test]
    async fn test_new_frame_replaces_previous() {
        let store = FrameStore::new();
        store.put(Bytes::from_static(b"old"));
        store.put(Bytes::from_static(b"new"));
        assert_eq!(store.get().unwrap().data.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_wait_for_next_returns_newer_frame() {
        let store = Arc::new(FrameStore::new());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for_next(0, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.put(Bytes::from_static(b"live"));

        let frame = waiter.await.unwrap().expect("should receive frame");
        assert_eq!(frame.data.as_ref(), b"live");
        assert_eq!(frame.seq, 1);
    }

    #[tokio::test]
    async fn test_wait_for_next_times_out() {
        let store = FrameStore::new();
        let result = store.wait_for_next(0, Duration::from_millis(30)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_next_ignores_already_seen_frame() {
        let store = FrameStore::new();
        let seq = store.put(Bytes::from_static(b"seen"));
        let result = store.wait_for_next(seq, Duration::from_millis(30)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_slow_reader_coalesces_to_latest() {
        let store = FrameStore::new();
        store.put(Bytes::from_static(b"f1"));
        store.put(Bytes::from_static(b"f2"));
        let latest = store.put(Bytes::from_static(b"f3"));

        // A reader that saw nothing jumps straight to the latest frame
        let frame = store
            .wait_for_next(0, Duration::from_millis(100))
            .await
            .expect("latest frame available");
        assert_eq!(frame.seq, latest);
        assert_eq!(frame.data.as_ref(), b"f3");
    }

    #[tokio::test]
    async fn test_put_does_not_block_without_readers() {
        let store = FrameStore::new();
        for i in 0..1000u32 {
            store.put(Bytes::from(i.to_le_bytes().to_vec()));
        }
        assert_eq!(store.current_seq(), 1000);
    }

    #[tokio::test]
    async fn test_many_waiters_all_wake() {
        let store = Arc::new(FrameStore::new());
        let mut waiters = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            waiters.push(tokio::spawn(async move {
                store.wait_for_next(0, Duration::from_secs(5)).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.put(Bytes::from_static(b"fanout"));

        for waiter in waiters {
            let frame = waiter.await.unwrap().expect("every waiter wakes");
            assert_eq!(frame.data.as_ref(), b"fanout");
        }
    }
}
