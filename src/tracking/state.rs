//! Per-marker tracking state.

use crate::markers::MarkerEntry;

/// State of one marker within a session.
///
/// There is no lost state: a marker that drops out of view keeps its last
/// transform and stays `Tracking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Never found (or its renderable could not be created yet).
    Idle,
    /// Has a renderable that follows the marker.
    Tracking,
}

impl MarkerState {
    /// The bound renderable is the state discriminant.
    pub fn of(entry: &MarkerEntry) -> Self {
        if entry.renderable().is_some() {
            Self::Tracking
        } else {
            Self::Idle
        }
    }
}

impl Default for MarkerState {
    fn default() -> Self {
        Self::Idle
    }
}
