//! Software-in-the-loop harness for `balbot_core`.
//!
//! A plant adapter (see [`adapter`]) simulates the body and wheels, the
//! [`platform`] module exposes it to the balance loop as peripherals, and
//! [`SitlBridge`] runs both in lockstep.

pub mod adapter;
pub mod bridge;
pub mod error;
pub mod platform;
pub mod store;
pub mod types;

pub use adapter::{PendulumAdapter, PendulumConfig, SimulatorAdapter, SimulatorCapabilities};
pub use bridge::{SitlBridge, TimeMode};
pub use error::SimulatorError;
pub use platform::{SimClock, SimHardware};
pub use store::MemoryStore;
pub use types::{ActuatorCommands, ImuData, SensorData, TelemetryRecord};
