//! Motor output trait.

use super::error::ActuatorError;
use crate::robot::DriveCommand;

/// Receives exactly one drive command per tick.
///
/// The command is applied as-is; limits and deadzone compensation have
/// already been handled by the controller.
pub trait TorqueSink {
    fn apply(&mut self, command: &DriveCommand) -> Result<(), ActuatorError>;
}
