//! Virtual camera intrinsics derived from frame and viewport geometry.
//!
//! There is no real calibration here: the focal length is taken as the
//! larger image dimension and the principal point as the image center.
//! What matters is that the renderer's perspective FOV agrees with the
//! pinhole model the detector uses to compute poses.
//!
//! The detector's FOV convention is measured around the optical axis:
//!
//! ```text
//! fov = atan2(cx, f) + atan2(w - cx, f)
//! ```
//!
//! while a symmetric-frustum renderer expects `2 * atan(w / (2 f))`. The
//! ratio of the two is applied as a correction scale.

use nalgebra::Matrix3;
use tracing::debug;

use crate::error::SessionError;

/// Pinhole intrinsics with zero distortion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// k1, k2, p1, p2. Always zero.
    pub distortion: [f64; 4],
    /// Frame size these intrinsics were computed for.
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    /// K matrix.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0,     self.cx,
            0.0,     self.fy, self.cy,
            0.0,     0.0,     1.0,
        )
    }
}

/// Values derived from a camera matrix, image size and sensor aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationValues {
    /// Horizontal field of view in degrees.
    pub fovx: f64,
    /// Vertical field of view in degrees.
    pub fovy: f64,
    /// Focal length in aperture units (mm when the aperture is given in mm).
    pub focal_length: f64,
    /// Principal point in aperture units.
    pub principal_point: (f64, f64),
    /// fy / fx.
    pub aspect_ratio: f64,
}

/// Compute field of view, focal length and principal point from K.
///
/// An aperture of zero is allowed and yields a focal length and principal
/// point of zero; the field of view does not depend on the aperture.
pub fn calibration_matrix_values(
    k: &Matrix3<f64>,
    image_width: f64,
    image_height: f64,
    aperture_width: f64,
    aperture_height: f64,
) -> CalibrationValues {
    let fx = k[(0, 0)];
    let fy = k[(1, 1)];
    let cx = k[(0, 2)];
    let cy = k[(1, 2)];

    let fovx = (cx.atan2(fx) + (image_width - cx).atan2(fx)).to_degrees();
    let fovy = (cy.atan2(fy) + (image_height - cy).atan2(fy)).to_degrees();

    // pixels -> aperture units
    let sx = aperture_width / image_width;
    let sy = aperture_height / image_height;

    CalibrationValues {
        fovx,
        fovy,
        focal_length: fx * sx,
        principal_point: (cx * sx, cy * sy),
        aspect_ratio: fy / fx,
    }
}

/// Which renderer axis the recommended FOV applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FovAxis {
    Horizontal,
    Vertical,
}

/// Everything computed at session start, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub intrinsics: CameraIntrinsics,
    pub width_scale: f64,
    pub height_scale: f64,
    pub image_size_scale: f64,
    /// Image size used for the FOV computation, after `image_size_scale`.
    pub scaled_size: (f64, f64),
    pub raw: CalibrationValues,
    pub fov_x_scale: f64,
    pub fov_y_scale: f64,
    pub fov_axis: FovAxis,
    /// Degrees.
    pub recommended_fov: f64,
}

impl CalibrationReport {
    fn log(&self) {
        let k = &self.intrinsics;
        debug!(
            fx = k.fx,
            fy = k.fy,
            cx = k.cx,
            cy = k.cy,
            distortion = ?k.distortion,
            "camera matrix"
        );
        debug!(
            image_w = self.scaled_size.0,
            image_h = self.scaled_size.1,
            aperture_w = 0.0,
            aperture_h = 0.0,
            fovx = self.raw.fovx,
            fovy = self.raw.fovy,
            focal_length = self.raw.focal_length,
            principal_point = ?self.raw.principal_point,
            aspect_ratio = self.raw.aspect_ratio,
            "calibration matrix values"
        );
        debug!(
            fov_x_scale = self.fov_x_scale,
            fov_y_scale = self.fov_y_scale,
            axis = ?self.fov_axis,
            fov = self.recommended_fov,
            "recommended renderer fov"
        );
    }
}

/// Derive intrinsics and the renderer FOV for a frame shown in a viewport.
///
/// Pure function of its four inputs. When the width and height scales are
/// equal the vertical branch is taken.
pub fn compute_intrinsics(
    image_width: u32,
    image_height: u32,
    viewport_width: u32,
    viewport_height: u32,
) -> Result<CalibrationReport, SessionError> {
    if image_width == 0 || image_height == 0 {
        return Err(SessionError::Configuration(format!(
            "image size must be positive, got {image_width}x{image_height}"
        )));
    }
    if viewport_width == 0 || viewport_height == 0 {
        return Err(SessionError::Configuration(format!(
            "viewport size must be positive, got {viewport_width}x{viewport_height}"
        )));
    }

    let width = image_width as f64;
    let height = image_height as f64;
    let vp_width = viewport_width as f64;
    let vp_height = viewport_height as f64;

    let width_scale = vp_width / width;
    let height_scale = vp_height / height;
    let fit_width = width_scale < height_scale;
    let image_size_scale = if fit_width { vp_height / vp_width } else { 1.0 };

    let max_dim = width.max(height);
    let intrinsics = CameraIntrinsics {
        fx: max_dim,
        fy: max_dim,
        cx: width / 2.0,
        cy: height / 2.0,
        distortion: [0.0; 4],
        width: image_width,
        height: image_height,
    };

    let scaled_w = width * image_size_scale;
    let scaled_h = height * image_size_scale;
    let raw = calibration_matrix_values(&intrinsics.matrix(), scaled_w, scaled_h, 0.0, 0.0);

    let CameraIntrinsics { fx, fy, cx, cy, .. } = intrinsics;
    let fov_x_scale =
        (2.0 * (scaled_w / (2.0 * fx)).atan()) / (cx.atan2(fx) + (scaled_w - cx).atan2(fx));
    let fov_y_scale =
        (2.0 * (scaled_h / (2.0 * fy)).atan()) / (cy.atan2(fy) + (scaled_h - cy).atan2(fy));

    let (fov_axis, recommended_fov) = if fit_width {
        (FovAxis::Horizontal, raw.fovx * fov_x_scale)
    } else {
        (FovAxis::Vertical, raw.fovy * fov_y_scale)
    };

    let report = CalibrationReport {
        intrinsics,
        width_scale,
        height_scale,
        image_size_scale,
        scaled_size: (scaled_w, scaled_h),
        raw,
        fov_x_scale,
        fov_y_scale,
        fov_axis,
        recommended_fov,
    };
    report.log();
    Ok(report)
}
