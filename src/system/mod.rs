//! Frame loop orchestration and thread management.
//!
//! This module contains `TrackerSystem`, which moves a tracking session onto
//! a worker thread and feeds it frames with latest-only semantics, along with
//! the state shared between the worker and its callers.

mod frame_loop;
pub mod shared_state;

pub use frame_loop::TrackerSystem;
pub use shared_state::{SharedState, TrackingStatus};
