//! Renderer-style Euler rotations used for the cosmetic local offset.

use nalgebra::{Matrix4, UnitQuaternion, Vector3};

/// Rotation from Euler angles in degrees, renderer convention.
///
/// Rotations are applied about Z first, then X, then Y:
/// `R = Ry · Rx · Rz`.
pub fn euler_degrees(angles: &Vector3<f64>) -> UnitQuaternion<f64> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles.x.to_radians());
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles.y.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles.z.to_radians());
    ry * rx * rz
}

/// Rotate a transform about its own local axes (post-multiply).
pub fn rotate_local(transform: &Matrix4<f64>, angles: &Vector3<f64>) -> Matrix4<f64> {
    if *angles == Vector3::zeros() {
        return *transform;
    }
    transform * euler_degrees(angles).to_homogeneous()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_axis_matches_axis_angle() {
        let q = euler_degrees(&Vector3::new(0.0, 90.0, 0.0));
        let v = q * Vector3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(v, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_z_applied_before_x() {
        // Z first sends +X to +Y, then X turns +Y into +Z.
        let q = euler_degrees(&Vector3::new(90.0, 0.0, 90.0));
        let v = q * Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(v, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_local_keeps_translation() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let rotated = rotate_local(&m, &Vector3::new(30.0, 45.0, 60.0));
        assert_relative_eq!(rotated[(0, 3)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rotated[(1, 3)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(rotated[(2, 3)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)) * 2.0;
        assert_eq!(rotate_local(&m, &Vector3::zeros()), m);
    }
}
