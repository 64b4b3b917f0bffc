//! Simulated peripherals for SITL.
//!
//! `SimHardware` implements the balance loop's hardware traits on top of
//! sensor data injected by the bridge
//! ([`inject_sensors`](SimHardware::inject_sensors)) and captures the drive
//! command for the adapter
//! ([`collect_actuator_commands`](SimHardware::collect_actuator_commands)).
//! Faults can be injected per peripheral.

pub mod timer;

pub use timer::SimClock;

use balbot_core::robot::{DriveCommand, TestSetpoint, TEST_PWM_MAX};
use balbot_core::traits::{
    ActuatorError, AngleSensor, BalanceHardware, BatterySource, ImuSample, ImuSource,
    SensorError, TorqueSink,
};
use nalgebra::Vector3;

use crate::types::{ActuatorCommands, SensorData};

/// Torque produced by a full-scale test PWM command.
pub const PWM_FULL_SCALE_TORQUE: f32 = 3.0;

#[derive(Debug, Default)]
pub struct SimImu {
    sample: Option<ImuSample>,
    fault: Option<SensorError>,
}

impl ImuSource for SimImu {
    fn read_imu(&mut self) -> Result<ImuSample, SensorError> {
        if let Some(e) = self.fault {
            return Err(e);
        }
        self.sample.ok_or(SensorError::NoResponse)
    }
}

#[derive(Debug, Default)]
pub struct SimEncoder {
    angle: Option<f32>,
    fault: Option<SensorError>,
}

impl AngleSensor for SimEncoder {
    fn read_angle(&mut self) -> Result<f32, SensorError> {
        if let Some(e) = self.fault {
            return Err(e);
        }
        self.angle.ok_or(SensorError::NoResponse)
    }
}

#[derive(Debug, Default)]
pub struct SimBattery {
    voltage: f32,
}

impl BatterySource for SimBattery {
    fn voltage(&mut self) -> f32 {
        self.voltage
    }
}

/// Motor driver. Accepts torque and PWM test commands; speed and
/// position test modes are rejected.
#[derive(Debug, Default)]
pub struct SimDrive {
    torque: [f32; 2],
    fault: bool,
}

fn pwm_to_torque(pwm: i16) -> f32 {
    pwm as f32 / TEST_PWM_MAX as f32 * PWM_FULL_SCALE_TORQUE
}

impl TorqueSink for SimDrive {
    fn apply(&mut self, command: &DriveCommand) -> Result<(), ActuatorError> {
        if self.fault {
            self.torque = [0.0; 2];
            return Err(ActuatorError::DriverFault);
        }
        match *command {
            DriveCommand::Torque { left, right } => {
                self.torque = [left, right];
                Ok(())
            }
            DriveCommand::Test {
                left: TestSetpoint::Pwm(left),
                right: TestSetpoint::Pwm(right),
            } => {
                self.torque = [pwm_to_torque(left), pwm_to_torque(right)];
                Ok(())
            }
            DriveCommand::Test { .. } => {
                self.torque = [0.0; 2];
                Err(ActuatorError::Unsupported)
            }
        }
    }
}

/// Every simulated peripheral of one robot.
#[derive(Debug, Default)]
pub struct SimHardware {
    imu: SimImu,
    left: SimEncoder,
    right: SimEncoder,
    battery: SimBattery,
    drive: SimDrive,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Sensor injection (bridge → platform) ---

    pub fn inject_sensors(&mut self, data: &SensorData) {
        let [ax, ay, az] = data.imu.accel_g;
        let [gx, gy, gz] = data.imu.gyro_dps;
        self.imu.sample = Some(ImuSample::new(
            Vector3::new(ax, ay, az),
            Vector3::new(gx, gy, gz),
        ));
        self.left.angle = Some(data.wheel_angle_rad[0]);
        self.right.angle = Some(data.wheel_angle_rad[1]);
        self.battery.voltage = data.battery_v;
    }

    // --- Fault injection ---

    pub fn set_imu_fault(&mut self, fault: Option<SensorError>) {
        self.imu.fault = fault;
    }

    pub fn set_encoder_fault(&mut self, fault: Option<SensorError>) {
        self.left.fault = fault;
        self.right.fault = fault;
    }

    pub fn set_driver_fault(&mut self, fault: bool) {
        self.drive.fault = fault;
    }

    // --- Actuator collection (platform → bridge) ---

    /// Last applied wheel torques, [left, right].
    pub fn torque(&self) -> [f32; 2] {
        self.drive.torque
    }

    pub fn collect_actuator_commands(&self, timestamp_us: u64) -> ActuatorCommands {
        ActuatorCommands {
            timestamp_us,
            torque: self.drive.torque,
        }
    }
}

impl BalanceHardware for SimHardware {
    type Imu = SimImu;
    type Wheel = SimEncoder;
    type Battery = SimBattery;
    type Drive = SimDrive;

    fn imu(&mut self) -> &mut SimImu {
        &mut self.imu
    }

    fn left_wheel(&mut self) -> &mut SimEncoder {
        &mut self.left
    }

    fn right_wheel(&mut self) -> &mut SimEncoder {
        &mut self.right
    }

    fn battery(&mut self) -> &mut SimBattery {
        &mut self.battery
    }

    fn drive(&mut self) -> &mut SimDrive {
        &mut self.drive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImuData;

    fn sample_data() -> SensorData {
        SensorData {
            timestamp_us: 1000,
            imu: ImuData {
                accel_g: [0.0, 0.0, 1.0],
                gyro_dps: [0.1, -0.5, 0.0],
            },
            wheel_angle_rad: [1.0, 2.0],
            battery_v: 12.2,
        }
    }

    #[test]
    fn test_reads_fail_before_first_injection() {
        let mut hw = SimHardware::new();
        assert_eq!(hw.imu().read_imu(), Err(SensorError::NoResponse));
        assert_eq!(hw.left_wheel().read_angle(), Err(SensorError::NoResponse));
    }

    #[test]
    fn test_sensor_injection() {
        let mut hw = SimHardware::new();
        hw.inject_sensors(&sample_data());

        let imu = hw.imu().read_imu().unwrap();
        assert_eq!(imu.gyro, Vector3::new(0.1, -0.5, 0.0));
        assert_eq!(hw.left_wheel().read_angle(), Ok(1.0));
        assert_eq!(hw.right_wheel().read_angle(), Ok(2.0));
        assert_eq!(hw.battery().voltage(), 12.2);
    }

    #[test]
    fn test_fault_injection() {
        let mut hw = SimHardware::new();
        hw.inject_sensors(&sample_data());
        hw.set_imu_fault(Some(SensorError::Timeout));
        assert_eq!(hw.imu().read_imu(), Err(SensorError::Timeout));

        hw.set_imu_fault(None);
        assert!(hw.imu().read_imu().is_ok());
    }

    #[test]
    fn test_drive_torque_and_pwm() {
        let mut hw = SimHardware::new();
        hw.drive().apply(&DriveCommand::torque(1.5, -0.5)).unwrap();
        assert_eq!(hw.torque(), [1.5, -0.5]);

        let pwm = DriveCommand::Test {
            left: TestSetpoint::Pwm(500),
            right: TestSetpoint::Pwm(-1000),
        };
        hw.drive().apply(&pwm).unwrap();
        assert_eq!(hw.torque(), [1.5, -3.0]);

        let commands = hw.collect_actuator_commands(42);
        assert_eq!(commands.timestamp_us, 42);
        assert_eq!(commands.torque, [1.5, -3.0]);
    }

    #[test]
    fn test_drive_rejects_speed_mode() {
        let mut hw = SimHardware::new();
        let speed = DriveCommand::Test {
            left: TestSetpoint::Speed(1.0),
            right: TestSetpoint::Speed(1.0),
        };
        assert_eq!(hw.drive().apply(&speed), Err(ActuatorError::Unsupported));
        assert_eq!(hw.torque(), [0.0, 0.0]);
    }

    #[test]
    fn test_driver_fault_zeroes_output() {
        let mut hw = SimHardware::new();
        hw.set_driver_fault(true);
        assert_eq!(
            hw.drive().apply(&DriveCommand::torque(1.0, 1.0)),
            Err(ActuatorError::DriverFault)
        );
        assert_eq!(hw.torque(), [0.0, 0.0]);
    }
}
