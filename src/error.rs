//! Error types for the tracking core.
//!
//! Only `SessionError::Configuration` and `SessionError::ResolutionChanged`
//! stop a session. Everything else is scoped to a single marker and surfaces
//! as a log line plus a per-marker outcome in the frame summary.

use thiserror::Error;

/// Errors that abort `initialize` or reject a whole frame.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or empty reference-image list, bad dimensions, duplicate ids.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The frame source changed resolution after calibration.
    #[error("frame is {got_width}x{got_height} but session was calibrated for {width}x{height}; re-initialize required")]
    ResolutionChanged {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// `process_frame` called before `initialize`.
    #[error("session not initialized")]
    NotInitialized,
}

/// A reference image could not be turned into a trained pattern.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Too few distinguishing features to match against.
    #[error("marker '{id}': {found} features, need at least {required}")]
    InsufficientFeatures {
        id: String,
        found: usize,
        required: usize,
    },

    /// The id is already present in the registry.
    #[error("marker '{0}' is already registered")]
    Duplicate(String),

    /// Any other trainer failure.
    #[error("marker '{id}': training failed: {source}")]
    Trainer {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Set-once violations on a registry entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("marker '{0}' already has a renderable bound")]
    AlreadyBound(String),

    #[error("unknown marker '{0}'")]
    UnknownMarker(String),
}
