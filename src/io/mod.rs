//! Configuration and frame sources on disk.

pub mod config;
pub mod frames;

pub use config::{MarkerConfig, TrackerConfig, ViewportConfig};
pub use frames::{FrameSequence, ImageEntry};
