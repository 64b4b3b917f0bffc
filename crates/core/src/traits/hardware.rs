//! Aggregate hardware trait
//!
//! Bundles every peripheral the balance loop touches behind associated
//! types, so a board (or the simulator) is wired in with a single generic
//! parameter and dispatched at compile time.

use super::actuator::TorqueSink;
use super::sensors::{AngleSensor, BatterySource, ImuSource};

pub trait BalanceHardware {
    /// Inertial sensor type
    type Imu: ImuSource;
    /// Wheel encoder type (one instance per wheel)
    type Wheel: AngleSensor;
    /// Battery monitor type
    type Battery: BatterySource;
    /// Motor driver type
    type Drive: TorqueSink;

    fn imu(&mut self) -> &mut Self::Imu;
    fn left_wheel(&mut self) -> &mut Self::Wheel;
    fn right_wheel(&mut self) -> &mut Self::Wheel;
    fn battery(&mut self) -> &mut Self::Battery;
    fn drive(&mut self) -> &mut Self::Drive;
}
