//! Attitude output types
//!
//! Angles are in degrees throughout the balance loop; the estimator works in
//! radians internally and converts once on output.

use nalgebra::{Quaternion, Vector3};

pub(crate) const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub(crate) const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Estimated orientation and body rates.
///
/// Sequence ZYX, body frame x forward / y left / z up. Positive pitch means
/// the robot leans forward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    /// Roll angle in degrees
    pub roll: f32,
    /// Pitch angle in degrees
    pub pitch: f32,
    /// Yaw angle in degrees, wrapped to [-180, 180]
    pub yaw: f32,
    /// Bias-corrected body rates in deg/s
    pub rate: Vector3<f32>,
}

impl Attitude {
    /// Pitch rate in deg/s
    pub fn pitch_rate(&self) -> f32 {
        self.rate.y
    }
}

/// Convert a (w, i, j, k) quaternion to (roll, pitch, yaw) in degrees.
///
/// The pitch argument is clamped to [-1, 1] so rounding near ±90° never
/// produces NaN.
pub fn quaternion_to_euler_deg(q: &Quaternion<f32>) -> (f32, f32, f32) {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let roll = libm::atan2f(2.0 * (w * x + y * z), 1.0 - 2.0 * (x * x + y * y));
    let sinp = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = libm::asinf(sinp);
    let yaw = libm::atan2f(2.0 * (w * z + x * y), 1.0 - 2.0 * (y * y + z * z));

    (roll * RAD_TO_DEG, pitch * RAD_TO_DEG, yaw * RAD_TO_DEG)
}

/// Wrap an angle in degrees to [-180, 180]. Non-finite input maps to 0.
pub fn wrap_degrees(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    libm::remainderf(angle, 360.0)
}
