//! Orientation math used by calibration and flexion estimation.
//!
//! Vectors are `glam::Vec3`; quaternions use the `quaternion-core`
//! `(w, [x, y, z])` representation. All angles returned here are degrees.

use glam::Vec3;
use quaternion_core::{Quaternion, RotationSequence, RotationType};

use crate::error::{JointError, JointResult};

/// Bound `value` to `[minimum, maximum]`
///
/// Argument order follows the physical reading "lower, value, upper".
#[inline]
pub fn clamp(minimum: f32, value: f32, maximum: f32) -> f32 {
    if minimum > value {
        return minimum;
    }
    if maximum < value {
        return maximum;
    }
    value
}

/// Unit direction of a raw 3-vector
///
/// Zero, NaN or infinite norms are reported as `DegenerateVector` instead
/// of producing a NaN direction.
pub fn normalize_vector(raw: [f32; 3]) -> JointResult<Vec3> {
    let vector = Vec3::from_array(raw);
    let norm = vector.length();
    if !norm.is_finite() || norm <= 0.0 {
        return Err(JointError::DegenerateVector { norm });
    }
    let unit = vector / norm;
    if !unit.is_finite() {
        return Err(JointError::DegenerateVector { norm });
    }
    Ok(unit)
}

/// Angle between two unit vectors
///
/// The dot product is clamped into the arccos domain since rounding can push
/// it slightly past +/-1.
pub fn angle_between_vectors(a: Vec3, b: Vec3) -> f32 {
    clamp(-1.0, a.dot(b), 1.0).acos().to_degrees()
}

/// Rotation taking the thigh frame to the shank frame: `shank * thigh^-1`
pub fn relative_rotation(thigh: Quaternion<f32>, shank: Quaternion<f32>) -> Quaternion<f32> {
    quaternion_core::mul(shank, quaternion_core::conj(thigh))
}

/// Intrinsic X-Y-Z Euler angles of `q`
pub fn euler_xyz_degrees(q: Quaternion<f32>) -> [f32; 3] {
    let [x, y, z] =
        quaternion_core::to_euler_angles(RotationType::Intrinsic, RotationSequence::XYZ, q);
    [x.to_degrees(), y.to_degrees(), z.to_degrees()]
}

pub fn quaternion_norm(q: Quaternion<f32>) -> f32 {
    quaternion_core::norm(q)
}

/// Total rotation angle of `thigh^-1 * shank`, about whatever axis
pub fn relative_rotation_angle(thigh: Quaternion<f32>, shank: Quaternion<f32>) -> f32 {
    let relative = quaternion_core::mul(quaternion_core::conj(thigh), shank);
    2.0 * clamp(-1.0, relative.0, 1.0).acos().to_degrees()
}
