//! State shared between the frame loop worker and its callers.
//!
//! The worker is the only writer. Callers read counters and the latest
//! tracking status while frames keep flowing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::tracking::FrameSummary;

/// Snapshot of the most recent processed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingStatus {
    pub last_timestamp_ns: Option<u64>,
    /// Markers updated in the last processed frame.
    pub tracked: Vec<String>,
    /// Last frame-level error, if the most recent frame was rejected.
    pub last_error: Option<String>,
}

pub struct SharedState {
    /// Protected by RwLock: the worker writes once per frame, callers read.
    pub status: RwLock<TrackingStatus>,

    /// Frames that reached `process_frame`.
    pub frames_processed: AtomicU64,

    /// Frames discarded because a previous frame was still pending.
    pub frames_dropped: AtomicU64,

    /// Request the worker to exit after the frame it is working on.
    pub shutdown_requested: AtomicBool,
}

impl SharedState {
    /// Create a new SharedState with zeroed counters.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count a processed frame and publish its tracked markers.
    pub fn record_summary(&self, summary: &FrameSummary) {
        self.frames_processed.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.write();
        status.last_timestamp_ns = Some(summary.timestamp_ns);
        status.tracked = summary.tracked_ids();
        status.last_error = None;
    }

    /// Publish a rejected frame.
    pub fn record_error(&self, timestamp_ns: u64, error: String) {
        let mut status = self.status.write();
        status.last_timestamp_ns = Some(timestamp_ns);
        status.tracked.clear();
        status.last_error = Some(error);
    }

    /// Count a frame dropped because the worker was busy.
    pub fn record_drop(&self) {
        self.frames_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot of the latest status.
    pub fn status(&self) -> TrackingStatus {
        self.status.read().clone()
    }

    /// Frames that reached the session successfully.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::SeqCst)
    }

    /// Frames dropped by the latest-only policy.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::SeqCst)
    }

    /// Request shutdown of the frame loop worker.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown was requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            status: RwLock::new(TrackingStatus::default()),
            frames_processed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            shutdown_requested: AtomicBool::new(false),
        }
    }
}
