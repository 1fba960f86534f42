//! Virtual camera model: intrinsics and renderer field of view.

pub mod intrinsics;

pub use intrinsics::{
    CalibrationReport, CalibrationValues, CameraIntrinsics, FovAxis, calibration_matrix_values,
    compute_intrinsics,
};
