//! Wheel angular velocity from absolute encoder angles.

use core::f32::consts::TAU;

/// Differentiates a wrapped shaft angle into angular velocity.
///
/// Deltas are unwrapped to [-π, π], so the wheel must turn less than half a
/// revolution per sample (about 1570 rad/s at a 2 ms tick).
#[derive(Debug, Clone, Default)]
pub struct WheelSpeedEstimator {
    last_angle: Option<f32>,
    last_ms: u64,
    velocity: f32,
}

impl WheelSpeedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last computed velocity in rad/s
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed a new angle (rad). Returns velocity in rad/s.
    ///
    /// A repeated timestamp or a non-finite angle keeps the previous
    /// velocity.
    pub fn update(&mut self, angle_rad: f32, now_ms: u64) -> f32 {
        if !angle_rad.is_finite() {
            return self.velocity;
        }
        if let Some(last) = self.last_angle {
            let dt_ms = now_ms.saturating_sub(self.last_ms);
            if dt_ms == 0 {
                return self.velocity;
            }
            let delta = libm::remainderf(angle_rad - last, TAU);
            self.velocity = delta / (dt_ms as f32 / 1000.0);
        }
        self.last_angle = Some(angle_rad);
        self.last_ms = now_ms;
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_has_zero_velocity() {
        let mut est = WheelSpeedEstimator::new();
        assert_eq!(est.update(1.0, 0), 0.0);
    }

    #[test]
    fn test_constant_rotation() {
        let mut est = WheelSpeedEstimator::new();
        est.update(0.0, 0);
        let v = est.update(0.02, 2);
        assert!((v - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_unwraps_across_zero() {
        let mut est = WheelSpeedEstimator::new();
        est.update(TAU - 0.01, 0);
        let v = est.update(0.01, 2);
        assert!((v - 10.0).abs() < 1e-2, "v = {}", v);

        let v = est.update(TAU - 0.01, 4);
        assert!((v + 10.0).abs() < 1e-2, "v = {}", v);
    }

    #[test]
    fn test_same_timestamp_keeps_velocity() {
        let mut est = WheelSpeedEstimator::new();
        est.update(0.0, 0);
        est.update(0.02, 2);
        assert!((est.update(0.5, 2) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_angle_is_skipped() {
        let mut est = WheelSpeedEstimator::new();
        est.update(0.0, 0);
        est.update(0.02, 2);
        assert!((est.update(f32::INFINITY, 4) - 10.0).abs() < 1e-3);
        assert!((est.update(f32::NAN, 6) - 10.0).abs() < 1e-3);

        // Resumes from the last good sample
        let v = est.update(0.06, 8);
        assert!((v - 6.667).abs() < 1e-2, "v = {}", v);
    }
}
