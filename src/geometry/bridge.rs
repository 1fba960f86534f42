//! Bridge between the detector's and the renderer's coordinate conventions.
//!
//! # Conventions
//!
//! The detector reports the marker pose in the computer-vision camera frame:
//! ```text
//!        +Y (down)
//!         |
//!         +------ +X (right)
//!        /
//!      +Z (forward, optical axis)
//! ```
//! The renderer uses a left-handed, Y-up frame:
//! ```text
//!        +Y (up)
//!         |
//!         +------ +X (right)
//!        /
//!      +Z (forward)
//! ```
//!
//! # Pipeline
//! ```text
//! world = camera_to_world · scale · invert_y · pose · invert_z
//! ```
//! Read right to left: the pose is re-expressed in the renderer's axes,
//! scaled to real-world marker size, then placed relative to the camera's
//! current world transform. The order is fixed; swapping `invert_y` and
//! `invert_z`, or moving the scale, mirrors or mis-scales the object.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};

/// Fixed axis corrections, built once per session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateBridge {
    invert_y: Matrix4<f64>,
    invert_z: Matrix4<f64>,
}

impl CoordinateBridge {
    pub fn new() -> Self {
        Self {
            invert_y: Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0)),
            invert_z: Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, -1.0)),
        }
    }

    /// diag(1, -1, 1, 1).
    pub fn invert_y(&self) -> &Matrix4<f64> {
        &self.invert_y
    }

    /// diag(1, 1, -1, 1).
    pub fn invert_z(&self) -> &Matrix4<f64> {
        &self.invert_z
    }

    /// Compose a detector pose into a renderer world transform.
    pub fn compose(
        &self,
        camera_to_world: &Matrix4<f64>,
        marker_scale: &Matrix4<f64>,
        pose: &Matrix4<f64>,
    ) -> Matrix4<f64> {
        camera_to_world * marker_scale * self.invert_y * pose * self.invert_z
    }
}

impl Default for CoordinateBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform diagonal scale (s, s, s, 1).
pub fn scale_matrix(scale: f64) -> Matrix4<f64> {
    Matrix4::new_nonuniform_scaling(&Vector3::repeat(scale))
}

/// Translation / rotation / scale split of an affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

/// Split an affine matrix into translation, rotation and per-axis scale.
///
/// Scale is the length of each basis column. A reflection (negative
/// determinant) is folded into the X scale so the rotation stays proper.
pub fn decompose(m: &Matrix4<f64>) -> Trs {
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();

    let mut scale = Vector3::new(
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    );
    if linear.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    let mut basis = linear;
    for i in 0..3 {
        if scale[i] != 0.0 {
            let col = basis.column(i) / scale[i];
            basis.set_column(i, &col);
        }
    }
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));

    Trs {
        translation,
        rotation,
        scale,
    }
}
