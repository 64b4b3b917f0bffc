pub mod capabilities;
pub mod pendulum;

use async_trait::async_trait;

pub use capabilities::SimulatorCapabilities;
pub use pendulum::{PendulumAdapter, PendulumConfig};

use crate::error::SimulatorError;
use crate::types::{ActuatorCommands, SensorData};

/// Pluggable interface for different plant simulator backends.
///
/// Implementations must be `Send + Sync` for object safety, allowing
/// adapters to be stored as `Box<dyn SimulatorAdapter>`.
#[async_trait]
pub trait SimulatorAdapter: Send + Sync {
    /// Unique identifier for this adapter type (e.g., "pendulum").
    fn adapter_type(&self) -> &'static str;

    /// Human-readable name for this adapter instance.
    fn name(&self) -> &str;

    /// Connect to the simulator backend. Resets the plant.
    async fn connect(&mut self) -> Result<(), SimulatorError>;

    async fn disconnect(&mut self) -> Result<(), SimulatorError>;

    fn is_connected(&self) -> bool;

    /// Receive sensor data (non-blocking, returns `None` if no data available).
    async fn receive_sensors(&mut self) -> Result<Option<SensorData>, SimulatorError>;

    /// Send wheel torques to the simulator.
    async fn send_actuators(&mut self, commands: &ActuatorCommands) -> Result<(), SimulatorError>;

    /// Advance one time step (lockstep).
    async fn step(&mut self) -> Result<(), SimulatorError>;

    /// Current simulation time in microseconds.
    fn sim_time_us(&self) -> u64;

    /// Simulation step size in microseconds.
    fn step_size_us(&self) -> u64;

    fn capabilities(&self) -> SimulatorCapabilities;
}

#[async_trait]
impl<T: SimulatorAdapter + ?Sized> SimulatorAdapter for Box<T> {
    fn adapter_type(&self) -> &'static str {
        (**self).adapter_type()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn connect(&mut self) -> Result<(), SimulatorError> {
        (**self).connect().await
    }

    async fn disconnect(&mut self) -> Result<(), SimulatorError> {
        (**self).disconnect().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn receive_sensors(&mut self) -> Result<Option<SensorData>, SimulatorError> {
        (**self).receive_sensors().await
    }

    async fn send_actuators(&mut self, commands: &ActuatorCommands) -> Result<(), SimulatorError> {
        (**self).send_actuators(commands).await
    }

    async fn step(&mut self) -> Result<(), SimulatorError> {
        (**self).step().await
    }

    fn sim_time_us(&self) -> u64 {
        (**self).sim_time_us()
    }

    fn step_size_us(&self) -> u64 {
        (**self).step_size_us()
    }

    fn capabilities(&self) -> SimulatorCapabilities {
        (**self).capabilities()
    }
}
