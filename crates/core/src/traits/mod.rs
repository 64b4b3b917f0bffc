//! Platform traits for the balance loop.
//!
//! The core never touches a bus or a register. Sensors, actuators, the
//! monotonic clock and the persistence backend are injected through the
//! traits in this module.
//!
//! # Design
//!
//! - Trait definitions are pure and have no feature gates
//! - Mock time is always available for host testing
//! - Hardware and simulator implementations live outside this crate

pub mod actuator;
pub mod error;
pub mod hardware;
pub mod sensors;
pub mod store;
pub mod time;

pub use actuator::TorqueSink;
pub use error::{ActuatorError, SensorError, StoreError};
pub use hardware::BalanceHardware;
pub use sensors::{AngleSensor, BatterySource, ImuSample, ImuSource};
pub use store::CalibrationStore;
pub use time::{MockTime, TimeSource};
