//! Geometry utilities: detector-to-renderer bridge, Euler offsets.

pub mod bridge;
pub mod euler;

pub use bridge::{CoordinateBridge, Trs, decompose, scale_matrix};
pub use euler::{euler_degrees, rotate_local};
