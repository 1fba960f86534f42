pub mod camera;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod io;
pub mod markers;
pub mod render;
pub mod system;
pub mod tracking;
