use balbot_core::command::CommandError;
use balbot_core::parameters::ParameterError;

/// Errors that can occur during simulator operations.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("Adapter not connected: {0}")]
    NotConnected(String),

    #[error("No sensor data available")]
    NoSensorData,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Command rejected: {0}")]
    CommandRejected(CommandError),

    #[error("Parameter store error: {0}")]
    Parameter(ParameterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CommandError> for SimulatorError {
    fn from(e: CommandError) -> Self {
        SimulatorError::CommandRejected(e)
    }
}

impl From<ParameterError> for SimulatorError {
    fn from(e: ParameterError) -> Self {
        SimulatorError::Parameter(e)
    }
}
