//! Persistence of calibration results.
//!
//! Every `load_*` returns `None` when the value was never saved, so a value
//! saved as zero is distinguishable from a missing one.

use nalgebra::Vector3;

use super::error::StoreError;
use crate::calibration::Deadzone;

pub trait CalibrationStore {
    fn load_deadzone(&self) -> Option<Deadzone>;
    fn save_deadzone(&mut self, deadzone: Deadzone) -> Result<(), StoreError>;

    /// Long-term gyro bias in deg/s
    fn load_gyro_bias(&self) -> Option<Vector3<f32>>;
    fn save_gyro_bias(&mut self, bias: Vector3<f32>) -> Result<(), StoreError>;

    /// Balance reference angle in degrees
    fn load_pitch_zero(&self) -> Option<f32>;
    fn save_pitch_zero(&mut self, pitch_zero: f32) -> Result<(), StoreError>;
}
