//! Tracking: per-frame detection of every registered marker.
//!
//! - Frame representation handed in by the frame source
//! - Per-marker state (idle until first detection, tracking afterwards)
//! - Session driver: detect, bridge to world space, create or update
//! - Per-frame results for diagnostics

pub mod frame;
pub mod result;
pub mod session;
pub mod state;

pub use frame::Frame;
pub use result::{FrameSummary, MarkerOutcome, MarkerReport};
pub use session::{DEFAULT_PREFAB, SessionConfig, TrackingSession};
pub use state::MarkerState;
