//! Mahony complementary filter
//!
//! Keeps a unit quaternion and corrects gyro drift with the error between
//! the measured gravity direction and the one predicted by the current
//! estimate (proportional + integral feedback on that error).

use nalgebra::{Quaternion, Vector3};

use super::attitude::{quaternion_to_euler_deg, Attitude, DEG_TO_RAD};
use crate::traits::ImuSample;

/// Filter gains and guards
#[derive(Debug, Clone, Copy)]
pub struct MahonyConfig {
    /// Proportional feedback gain (1/s)
    pub kp: f32,
    /// Integral feedback gain (1/s²)
    pub ki: f32,
    /// Largest integration step in seconds; longer gaps are truncated
    pub max_dt_s: f32,
    /// Accelerometer magnitudes below this (in g) skip the correction
    pub min_accel_g: f32,
}

impl Default for MahonyConfig {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.005,
            max_dt_s: 0.1,
            min_accel_g: 0.05,
        }
    }
}

/// Attitude estimator state
#[derive(Debug, Clone)]
pub struct MahonyEstimator {
    config: MahonyConfig,
    q: Quaternion<f32>,
    integral: Vector3<f32>,
    last_ms: Option<u64>,
    attitude: Attitude,
}

impl MahonyEstimator {
    pub fn new(config: MahonyConfig) -> Self {
        Self {
            config,
            q: Quaternion::identity(),
            integral: Vector3::zeros(),
            last_ms: None,
            attitude: Attitude::default(),
        }
    }

    /// Back to identity; the next update integrates nothing.
    pub fn reset(&mut self) {
        self.q = Quaternion::identity();
        self.integral = Vector3::zeros();
        self.last_ms = None;
        self.attitude = Attitude::default();
    }

    pub fn quaternion(&self) -> &Quaternion<f32> {
        &self.q
    }

    /// Most recent estimate
    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    /// Fuse one sample.
    ///
    /// `sample.gyro` must already be bias-corrected (deg/s). The elapsed
    /// time is derived from `now_ms` and clamped to `[0, max_dt_s]`.
    pub fn update(&mut self, sample: &ImuSample, now_ms: u64) -> Attitude {
        let dt = match self.last_ms {
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last) as f32 / 1000.0;
                elapsed.clamp(0.0, self.config.max_dt_s)
            }
            None => 0.0,
        };
        self.last_ms = Some(now_ms);

        let mut omega = sample.gyro * DEG_TO_RAD;

        let accel_norm = sample.accel.norm();
        if accel_norm > self.config.min_accel_g {
            let measured = sample.accel / accel_norm;
            let q = &self.q;
            let predicted = Vector3::new(
                2.0 * (q.i * q.k - q.w * q.j),
                2.0 * (q.w * q.i + q.j * q.k),
                q.w * q.w - q.i * q.i - q.j * q.j + q.k * q.k,
            );
            let error = measured.cross(&predicted);

            if self.config.ki > 0.0 {
                self.integral += error * (self.config.ki * dt);
            }
            omega += error * self.config.kp + self.integral;
        }

        let q_dot = self.q * Quaternion::from_imag(omega) * 0.5;
        self.q = self.q + q_dot * dt;
        let norm = self.q.norm();
        if norm > f32::EPSILON {
            self.q = self.q * (1.0 / norm);
        } else {
            self.q = Quaternion::identity();
        }

        let (roll, pitch, yaw) = quaternion_to_euler_deg(&self.q);
        self.attitude = Attitude {
            roll,
            pitch,
            yaw,
            rate: sample.gyro,
        };
        self.attitude
    }
}

impl Default for MahonyEstimator {
    fn default() -> Self {
        Self::new(MahonyConfig::default())
    }
}
