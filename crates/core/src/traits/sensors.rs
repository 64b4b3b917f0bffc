//! Sensor traits consumed by the balance loop.

use nalgebra::Vector3;

use super::error::SensorError;

/// One accelerometer + gyroscope sample in the robot body frame.
///
/// Axis convention: x forward, y to the left (pitch axis), z up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Specific force in g
    pub accel: Vector3<f32>,
    /// Angular rate in deg/s
    pub gyro: Vector3<f32>,
}

impl ImuSample {
    pub fn new(accel: Vector3<f32>, gyro: Vector3<f32>) -> Self {
        Self { accel, gyro }
    }

    /// Robot standing still and level
    pub fn level() -> Self {
        Self {
            accel: Vector3::new(0.0, 0.0, 1.0),
            gyro: Vector3::zeros(),
        }
    }
}

impl Default for ImuSample {
    fn default() -> Self {
        Self::level()
    }
}

/// 6-axis inertial sensor sampled once per tick
pub trait ImuSource {
    fn read_imu(&mut self) -> Result<ImuSample, SensorError>;
}

/// Absolute wheel angle sensor (magnetic encoder)
pub trait AngleSensor {
    /// Current shaft angle in radians, wrapped to one revolution
    fn read_angle(&mut self) -> Result<f32, SensorError>;
}

/// Battery voltage, already filtered by the platform
pub trait BatterySource {
    fn voltage(&mut self) -> f32;
}
