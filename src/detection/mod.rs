//! Pattern detection collaborator.
//!
//! The feature matching and homography estimation that decide whether a
//! pattern is visible live behind these traits. The tracking core only
//! trains one detector per reference image and then asks it, once per
//! frame, for a pose.

pub mod replay;

use anyhow::Result;
use nalgebra::Matrix4;

use crate::camera::CameraIntrinsics;
use crate::error::RegistrationError;
use crate::markers::ReferenceImage;
use crate::tracking::frame::Frame;

pub use replay::{DetectionLog, ReplayDetector, ReplayTrainer};

/// Marker-to-camera transform in the detector's convention
/// (X right, Y down, Z forward). Valid only for the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub marker_to_camera: Matrix4<f64>,
}

impl PoseEstimate {
    pub fn new(marker_to_camera: Matrix4<f64>) -> Self {
        Self { marker_to_camera }
    }
}

/// A detector trained on one pattern.
pub trait PatternDetector: Send {
    /// Look for the pattern in `frame`.
    ///
    /// `Ok(None)` means the pattern is not visible, which is a normal
    /// outcome. `Err` is a detector fault and only affects this marker.
    fn find(&mut self, frame: &Frame, camera: &CameraIntrinsics) -> Result<Option<PoseEstimate>>;
}

/// Builds trained detectors from reference images.
pub trait PatternTrainer {
    fn train(
        &mut self,
        reference: &ReferenceImage,
    ) -> std::result::Result<Box<dyn PatternDetector>, RegistrationError>;
}
