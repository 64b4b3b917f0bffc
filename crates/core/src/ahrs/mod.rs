//! Attitude estimation
//!
//! - [`mahony`]: quaternion complementary filter fusing accelerometer and gyro
//! - [`gyro_bias`]: boot-time and on-demand gyro bias estimation
//! - [`attitude`]: estimator output and Euler extraction

pub mod attitude;
pub mod gyro_bias;
pub mod mahony;

pub(crate) use attitude::DEG_TO_RAD;
pub use attitude::{quaternion_to_euler_deg, wrap_degrees, Attitude};
pub use gyro_bias::{BiasEvent, GyroBiasConfig, GyroBiasTracker};
pub use mahony::{MahonyConfig, MahonyEstimator};
