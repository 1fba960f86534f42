//! Marker definitions and the per-session marker registry.

pub mod reference;
pub mod registry;

pub use reference::ReferenceImage;
pub use registry::{MarkerEntry, MarkerRegistry};
