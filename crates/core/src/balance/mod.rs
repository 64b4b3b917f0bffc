//! The periodic balance loop
//!
//! One [`BalanceLoop::tick`] per control period (2 ms). Each tick:
//!
//! 1. Derive wheel speeds, attitude, gyro bias, pitch-zero drift and the
//!    fall / off-ground / recovery-ready classifications from one
//!    [`SensorFrame`].
//! 2. Step the deadzone calibration if the robot was calibrating.
//! 3. Run the motion state machine.
//! 4. Produce the drive command for the resulting state: calibration
//!    torques, the raw test override, swing-up, the balance cascade or zero.
//! 5. Publish a telemetry snapshot.
//!
//! Commands are applied before step 1 via [`BalanceLoop::apply_commands`].
//! [`BalanceLoop::run_tick`] wraps the whole sequence around a
//! [`BalanceHardware`] implementation.

use crate::ahrs::{
    wrap_degrees, BiasEvent, GyroBiasConfig, GyroBiasTracker, MahonyConfig, MahonyEstimator,
};
use crate::calibration::{CalibrationConfig, CalibrationEngine, CalibrationInputs, CalibrationStep};
use crate::command::{Command, JoystickWatchdog, ParamKey};
use crate::control::{CascadeConfig, CascadeController};
use crate::motion::{self, BatteryThresholds, MotionDecision, MotionInputs, MotionState};
use crate::parameters::BalanceParams;
use crate::recovery::{Recovery, RecoveryAction, SoftTakeover, SwingUpConfig};
use crate::robot::{DriveCommand, RobotState, TestOverride, TestSetpoint};
use crate::scheduler::{LoopTimer, TaskMetadata, BALANCE_TASK};
use crate::sense::{
    joystick_idle, FallConfig, FallDetector, OffGroundConfig, OffGroundDetector,
    OffGroundInputs, PitchZeroAdapter, PitchZeroConfig, RecoveryConfig, RecoveryReady,
    WheelSpeedEstimator,
};
use crate::telemetry::{SharedTelemetry, TelemetrySnapshot};
use crate::traits::{
    ActuatorError, AngleSensor, BalanceHardware, BatterySource, CalibrationStore, ImuSample,
    ImuSource, TimeSource, TorqueSink,
};
use crate::{log_debug, log_info, log_warn};

/// Every tunable of the loop's components
#[derive(Debug, Clone, Copy)]
pub struct BalanceConfig {
    pub task: TaskMetadata,
    pub mahony: MahonyConfig,
    pub gyro_bias: GyroBiasConfig,
    pub fall: FallConfig,
    pub offground: OffGroundConfig,
    pub recovery_ready: RecoveryConfig,
    pub pitch_zero: PitchZeroConfig,
    pub calibration: CalibrationConfig,
    pub cascade: CascadeConfig,
    pub swing_up: SwingUpConfig,
    pub takeover_ms: u64,
    pub battery: BatteryThresholds,
    pub joystick_timeout_ms: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            task: BALANCE_TASK,
            mahony: MahonyConfig::default(),
            gyro_bias: GyroBiasConfig::default(),
            fall: FallConfig::default(),
            offground: OffGroundConfig::default(),
            recovery_ready: RecoveryConfig::default(),
            pitch_zero: PitchZeroConfig::default(),
            calibration: CalibrationConfig::default(),
            cascade: CascadeConfig::default(),
            swing_up: SwingUpConfig::default(),
            takeover_ms: SoftTakeover::DEFAULT_DURATION_MS,
            battery: BatteryThresholds::default(),
            joystick_timeout_ms: JoystickWatchdog::DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Raw peripheral readings for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub imu: ImuSample,
    /// Shaft angles (rad)
    pub wheel_left_rad: f32,
    pub wheel_right_rad: f32,
    /// Smoothed pack voltage (V)
    pub battery_v: f32,
    /// At least one read failed this tick; the values are held from before
    pub fault: bool,
}

impl SensorFrame {
    pub fn new(imu: ImuSample, wheel_left_rad: f32, wheel_right_rad: f32, battery_v: f32) -> Self {
        Self {
            imu,
            wheel_left_rad,
            wheel_right_rad,
            battery_v,
            fault: false,
        }
    }
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self::new(ImuSample::level(), 0.0, 0.0, 0.0)
    }
}

pub struct BalanceLoop {
    config: BalanceConfig,
    robot: RobotState,

    estimator: MahonyEstimator,
    gyro_bias: GyroBiasTracker,
    wheel_left: WheelSpeedEstimator,
    wheel_right: WheelSpeedEstimator,
    fall: FallDetector,
    offground: OffGroundDetector,
    recovery_ready: RecoveryReady,
    recover_ready: bool,
    pitch_zero: PitchZeroAdapter,
    calibration: CalibrationEngine,
    cascade: CascadeController,
    recovery: Recovery,
    watchdog: JoystickWatchdog,

    timer: LoopTimer,
    last_tick_ms: Option<u64>,
    last_frame: SensorFrame,
    pending_driver_fault: bool,
    telemetry: TelemetrySnapshot,
    shared: Option<&'static SharedTelemetry>,
}

impl BalanceLoop {
    pub fn new(config: BalanceConfig) -> Self {
        Self {
            config,
            robot: RobotState::new(),
            estimator: MahonyEstimator::new(config.mahony),
            gyro_bias: GyroBiasTracker::new(config.gyro_bias),
            wheel_left: WheelSpeedEstimator::new(),
            wheel_right: WheelSpeedEstimator::new(),
            fall: FallDetector::new(config.fall),
            offground: OffGroundDetector::new(config.offground),
            recovery_ready: RecoveryReady::new(config.recovery_ready),
            recover_ready: false,
            pitch_zero: PitchZeroAdapter::new(config.pitch_zero),
            calibration: CalibrationEngine::new(config.calibration),
            cascade: CascadeController::new(config.cascade),
            recovery: Recovery::new(config.swing_up, config.takeover_ms),
            watchdog: JoystickWatchdog::new(config.joystick_timeout_ms),
            timer: LoopTimer::new(config.task),
            last_tick_ms: None,
            last_frame: SensorFrame::default(),
            pending_driver_fault: false,
            telemetry: TelemetrySnapshot::EMPTY,
            shared: None,
        }
    }

    pub fn robot(&self) -> &RobotState {
        &self.robot
    }

    pub fn state(&self) -> MotionState {
        self.robot.state
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry
    }

    pub fn timer(&self) -> &LoopTimer {
        &self.timer
    }

    pub fn calibration(&self) -> &CalibrationEngine {
        &self.calibration
    }

    /// Publish every tick's snapshot into `shared`.
    pub fn attach_telemetry(&mut self, shared: &'static SharedTelemetry) {
        self.shared = Some(shared);
    }

    /// Copy tunables into the robot state; effective next tick.
    pub fn apply_params(&mut self, params: &BalanceParams) {
        params.apply(&mut self.robot);
        self.fall.set_enabled(self.robot.fallen.enable);
    }

    pub fn set_battery_thresholds(&mut self, thresholds: BatteryThresholds) {
        self.config.battery = thresholds;
    }

    /// Load persisted calibration. Call once before the first tick.
    pub fn init<S: CalibrationStore + ?Sized>(&mut self, store: &S) {
        let saved = store.load_deadzone();
        self.robot.tor.deadzone = self.calibration.load_saved(saved, self.robot.recalib_req);
        match saved {
            Some(dz) => log_info!("loaded deadzone: left={} right={}", dz.left, dz.right),
            None => log_info!("no saved deadzone, calibration will run"),
        }

        if let Some(bias) = store.load_gyro_bias() {
            self.gyro_bias.load_base(bias);
            log_info!("loaded gyro bias: {} {} {}", bias.x, bias.y, bias.z);
        }
        self.robot.gyro_base = self.gyro_bias.base();
        self.robot.gyro_run = self.gyro_bias.run();

        if let Some(pitch_zero) = store.load_pitch_zero() {
            self.robot.pitch_zero = pitch_zero;
            log_info!("loaded pitch zero: {}", pitch_zero);
        }

        self.cascade.reset(&mut self.robot);
        self.robot.state = MotionState::Init;
    }

    /// Apply queued commands in order.
    pub fn apply_commands<I, S>(&mut self, commands: I, store: &mut S, now_ms: u64)
    where
        I: IntoIterator<Item = Command>,
        S: CalibrationStore + ?Sized,
    {
        for command in commands {
            self.apply_command(command, store, now_ms);
        }
    }

    pub fn apply_command<S: CalibrationStore + ?Sized>(
        &mut self,
        command: Command,
        store: &mut S,
        now_ms: u64,
    ) {
        log_debug!("command: {:?}", command);
        let robot = &mut self.robot;
        match command {
            Command::Run(running) => robot.run = running,
            Command::TestMode(enable) => {
                robot.test_cmd = enable;
                if !enable {
                    self.cascade.reset(robot);
                    robot.test = TestOverride::new(robot.test.mode);
                }
            }
            Command::SetDriveMode(mode) => robot.test = TestOverride::new(mode),
            Command::SetMotor { left, right } => {
                if robot.test_cmd && left.is_finite() && right.is_finite() {
                    robot.test.left = TestSetpoint::from_raw(robot.test.mode, left);
                    robot.test.right = TestSetpoint::from_raw(robot.test.mode, right);
                }
            }
            Command::EStop(active) => {
                if active != robot.estop {
                    log_warn!("e-stop {}", if active { "asserted" } else { "cleared" });
                }
                robot.estop = active;
            }
            Command::FallDetection(enable) => {
                robot.fallen.enable = enable;
                self.fall.set_enabled(enable);
                robot.fallen.is = self.fall.is_fallen();
                robot.fallen.count = 0;
            }
            Command::OffGroundProtection(enable) => robot.offground_protect = enable,
            Command::RecalibrateDeadzone => {
                robot.run = false;
                robot.recalib_req = true;
            }
            Command::RecalibrateGyro => robot.gyro_recalib_req = true,
            Command::Joystick { x, y } => {
                if x.is_finite() && y.is_finite() {
                    robot.joy_l = robot.joy;
                    robot.joy.x = x.clamp(-1.0, 1.0);
                    robot.joy.y = y.clamp(-1.0, 1.0);
                    robot.joy_stop_control = false;
                    self.watchdog.feed(now_ms);
                }
            }
            Command::SetParam { key, value } => self.set_param(key, value, store),
        }
    }

    fn set_param<S: CalibrationStore + ?Sized>(&mut self, key: ParamKey, value: f32, store: &mut S) {
        if !value.is_finite() {
            log_warn!("ignoring non-finite value for {}", key);
            return;
        }
        let robot = &mut self.robot;
        match key {
            ParamKey::AngleP => robot.ang_pid.p = value,
            ParamKey::AngleI => robot.ang_pid.i = value,
            ParamKey::AngleD => robot.ang_pid.d = value,
            ParamKey::SpeedP => robot.spd_pid.p = value,
            ParamKey::SpeedI => robot.spd_pid.i = value,
            ParamKey::SpeedD => robot.spd_pid.d = value,
            ParamKey::YawP => robot.yaw_pid.p = value,
            ParamKey::YawI => robot.yaw_pid.i = value,
            ParamKey::YawD => robot.yaw_pid.d = value,
            ParamKey::PitchZero => {
                robot.pitch_zero = value;
                if let Err(e) = store.save_pitch_zero(value) {
                    log_warn!("failed to persist pitch zero: {}", e);
                }
            }
            ParamKey::TorqueLimit => {
                if value > 0.0 {
                    robot.torque_limit = value;
                } else {
                    log_warn!("ignoring non-positive torque limit {}", value);
                }
            }
        }
    }

    /// Read every peripheral, holding the previous value of any failed read.
    pub fn read_frame<H: BalanceHardware>(&mut self, hw: &mut H) -> SensorFrame {
        let mut frame = self.last_frame;
        let mut failure = None;

        match hw.imu().read_imu() {
            Ok(sample) => frame.imu = sample,
            Err(e) => failure = Some(("IMU", e)),
        }
        match hw.left_wheel().read_angle() {
            Ok(angle) => frame.wheel_left_rad = angle,
            Err(e) => failure = Some(("left encoder", e)),
        }
        match hw.right_wheel().read_angle() {
            Ok(angle) => frame.wheel_right_rad = angle,
            Err(e) => failure = Some(("right encoder", e)),
        }
        frame.battery_v = hw.battery().voltage();
        frame.fault = failure.is_some();

        if let Some((device, e)) = failure {
            if !self.last_frame.fault {
                log_warn!("{} read failed: {}", device, e);
            }
        }
        self.last_frame = frame;
        frame
    }

    /// One complete period against real (or simulated) hardware.
    pub fn run_tick<H, S, T, I>(
        &mut self,
        hw: &mut H,
        store: &mut S,
        time: &T,
        commands: I,
    ) -> DriveCommand
    where
        H: BalanceHardware,
        S: CalibrationStore + ?Sized,
        T: TimeSource,
        I: IntoIterator<Item = Command>,
    {
        self.timer.begin(time.now_us());
        let now_ms = time.now_ms();

        self.apply_commands(commands, store, now_ms);
        let frame = self.read_frame(hw);
        let command = self.tick(&frame, now_ms, store);

        if let Err(e) = hw.drive().apply(&command) {
            log_warn!("drive command rejected: {}", e);
            if e == ActuatorError::DriverFault {
                self.pending_driver_fault = true;
            }
        }

        self.timer.end(time.now_us());
        command
    }

    /// Advance the loop by one period.
    pub fn tick<S: CalibrationStore + ?Sized>(
        &mut self,
        frame: &SensorFrame,
        now_ms: u64,
        store: &mut S,
    ) -> DriveCommand {
        let dt_s = match self.last_tick_ms {
            Some(last) => now_ms.saturating_sub(last) as f32 / 1000.0,
            None => 0.0,
        };
        self.last_tick_ms = Some(now_ms);
        let previous = self.robot.state;

        self.sense(frame, now_ms, store);

        let calibration = if previous == MotionState::Calibrating {
            Some(self.step_calibration(now_ms, store))
        } else {
            None
        };

        let inputs = MotionInputs {
            run_cmd: self.robot.run,
            test_cmd: self.robot.test_cmd,
            off_ground: self.robot.off_ground && self.robot.offground_protect,
            fallen: self.robot.fallen.is,
            recover_ready: self.recover_ready,
            calib_done: self.calibration.is_done(),
            estop: self.robot.estop,
            drv_fault: self.robot.drv_fault,
            recalib_req: self.robot.recalib_req,
            battery_v: self.robot.battery_v,
            battery: self.config.battery,
        };
        let decision = motion::step(previous, &inputs, now_ms);
        self.robot.state = decision.state;
        self.robot.lowbat_warn = decision.lowbat_warn;
        if decision.state != previous {
            self.on_transition(previous, decision.state);
        }

        let command = self.output(&decision, calibration, dt_s, now_ms);

        self.telemetry = TelemetrySnapshot::capture(&self.robot, now_ms);
        if let Some(shared) = self.shared {
            shared.publish(self.telemetry);
        }
        command
    }

    fn sense<S: CalibrationStore + ?Sized>(
        &mut self,
        frame: &SensorFrame,
        now_ms: u64,
        store: &mut S,
    ) {
        let robot = &mut self.robot;

        robot.w_left = self.wheel_left.update(frame.wheel_left_rad, now_ms);
        robot.w_right = self.wheel_right.update(frame.wheel_right_rad, now_ms);
        robot.battery_v = frame.battery_v;
        robot.drv_fault = frame.fault || core::mem::take(&mut self.pending_driver_fault);

        robot.imu_l = robot.imu;
        let corrected = ImuSample::new(frame.imu.accel, self.gyro_bias.correct(frame.imu.gyro));
        let attitude = self.estimator.update(&corrected, now_ms);
        robot.imu = attitude;
        robot.yaw.last = robot.yaw.now;
        robot.yaw.now = wrap_degrees(attitude.yaw);

        if !robot.joy_stop_control && self.watchdog.expired(now_ms) {
            log_warn!("joystick updates stopped, holding position");
            robot.joy_stop_control = true;
            robot.joy.x = 0.0;
            robot.joy.y = 0.0;
        }
        let idle = joystick_idle(robot.joy.x, robot.joy.y);

        match self.gyro_bias.update(
            frame.imu.gyro,
            attitude.pitch,
            idle,
            robot.gyro_recalib_req,
            now_ms,
        ) {
            Some(BiasEvent::RunUpdated(bias)) => {
                log_info!("gyro bias estimated: {} {} {}", bias.x, bias.y, bias.z);
            }
            Some(BiasEvent::BasePromoted(bias)) => {
                robot.gyro_recalib_req = false;
                log_info!("gyro bias recalibrated: {} {} {}", bias.x, bias.y, bias.z);
                if let Err(e) = store.save_gyro_bias(bias) {
                    log_warn!("failed to persist gyro bias: {}", e);
                }
            }
            None => {}
        }
        robot.gyro_base = self.gyro_bias.base();
        robot.gyro_run = self.gyro_bias.run();

        robot.pitch_zero =
            self.pitch_zero
                .adapt(robot.pitch_zero, attitude.pitch, attitude.pitch_rate(), idle);

        robot.off_ground = self.offground.update(
            &OffGroundInputs {
                speed_left: robot.w_left,
                speed_right: robot.w_right,
                torque_left: robot.tor.left,
                torque_right: robot.tor.right,
                pitch_deg: attitude.pitch,
            },
            now_ms,
        );

        if self.fall.is_enabled() != robot.fallen.enable {
            self.fall.set_enabled(robot.fallen.enable);
        }
        self.fall.update(attitude.pitch);
        robot.fallen.is = self.fall.is_fallen();
        robot.fallen.count = self.fall.count().min(u8::MAX as u32) as u8;

        self.recover_ready =
            self.recovery_ready
                .update(attitude.pitch, attitude.pitch_rate(), now_ms);
    }

    fn step_calibration<S: CalibrationStore + ?Sized>(
        &mut self,
        now_ms: u64,
        store: &mut S,
    ) -> CalibrationStep {
        let robot = &mut self.robot;
        let inputs = CalibrationInputs {
            pitch_deg: robot.imu.pitch,
            pitch_rate_dps: robot.imu.pitch_rate(),
            speed_left: robot.w_left,
            speed_right: robot.w_right,
        };
        let step = self.calibration.step(&inputs, now_ms);
        robot.tor.deadzone = step.deadzone;

        if let Some(deadzone) = step.completed {
            robot.imu_zero = robot.imu;
            if let Err(e) = store.save_deadzone(deadzone) {
                log_warn!("failed to persist deadzone: {}", e);
            }
        }
        step
    }

    fn on_transition(&mut self, from: MotionState, to: MotionState) {
        log_info!("state {} -> {}", from, to);

        if to == MotionState::Calibrating {
            let force = self.robot.recalib_req || from == MotionState::Fault;
            self.calibration.restart(force);
            self.robot.recalib_req = false;
        }
        if to == MotionState::Fallen {
            self.cascade.reset(&mut self.robot);
            self.recovery.reset();
        }
        if from == MotionState::Fallen {
            self.recovery.reset();
        }
    }

    fn output(
        &mut self,
        decision: &MotionDecision,
        calibration: Option<CalibrationStep>,
        dt_s: f32,
        now_ms: u64,
    ) -> DriveCommand {
        match decision.state {
            MotionState::Calibrating => match calibration {
                Some(step) => self.set_wheel_torques(step.torque_left, step.torque_right),
                None => self.set_wheel_torques(0.0, 0.0),
            },
            MotionState::Test => {
                let (left, right) = (self.robot.test.left, self.robot.test.right);
                // Raw setpoints keep the off-ground torque check live
                self.robot.tor.left = left.raw();
                self.robot.tor.right = right.raw();
                DriveCommand::Test { left, right }
            }
            MotionState::Fallen => match self.recovery.update(self.robot.imu.pitch, now_ms) {
                RecoveryAction::Swing { left, right } => {
                    self.robot.tor.base = 0.0;
                    self.robot.tor.yaw = 0.0;
                    self.robot.tor.left = left;
                    self.robot.tor.right = right;
                    DriveCommand::torque(left, right)
                }
                RecoveryAction::Upright => self.set_wheel_torques(0.0, 0.0),
                RecoveryAction::Hold { gain } => self.run_cascade(dt_s, gain),
            },
            _ if decision.control_allowed => {
                let gain = if self.recovery.takeover_active(now_ms) {
                    self.recovery.takeover_gain(now_ms)
                } else {
                    1.0
                };
                self.run_cascade(dt_s, gain)
            }
            _ => {
                self.cascade.reset(&mut self.robot);
                DriveCommand::ZERO
            }
        }
    }

    fn run_cascade(&mut self, dt_s: f32, gain: f32) -> DriveCommand {
        let (left, right) = self.cascade.update(&mut self.robot, dt_s);
        self.robot.tor.left = left * gain;
        self.robot.tor.right = right * gain;
        DriveCommand::torque(self.robot.tor.left, self.robot.tor.right)
    }

    fn set_wheel_torques(&mut self, left: f32, right: f32) -> DriveCommand {
        let tor = &mut self.robot.tor;
        tor.left = left;
        tor.right = right;
        tor.base = 0.5 * (left + right);
        tor.yaw = 0.5 * (right - left);
        DriveCommand::torque(left, right)
    }
}

impl Default for BalanceLoop {
    fn default() -> Self {
        Self::new(BalanceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ahrs::DEG_TO_RAD;
    use crate::calibration::Deadzone;
    use crate::parameters::ParameterStore;
    use crate::robot::DriveMode;
    use crate::traits::{MockTime, SensorError};
    use nalgebra::Vector3;

    const TICK_MS: u64 = 2;

    fn tilted(pitch_deg: f32) -> ImuSample {
        let p = pitch_deg * DEG_TO_RAD;
        ImuSample::new(
            Vector3::new(-libm::sinf(p), 0.0, libm::cosf(p)),
            Vector3::zeros(),
        )
    }

    /// Robot on a stand: a wheel spins at 10 rad/s while its torque beats
    /// static friction, and the IMU reads a fixed pitch.
    struct Bench {
        now_ms: u64,
        pitch_deg: f32,
        friction: f32,
        left_rad: f32,
        right_rad: f32,
        battery_v: f32,
        fault: bool,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                now_ms: 0,
                pitch_deg: 0.0,
                friction: 0.6,
                left_rad: 0.0,
                right_rad: 0.0,
                battery_v: 12.4,
                fault: false,
            }
        }

        fn frame(&self) -> SensorFrame {
            let mut frame = SensorFrame::new(
                tilted(self.pitch_deg),
                self.left_rad,
                self.right_rad,
                self.battery_v,
            );
            frame.fault = self.fault;
            frame
        }

        fn spin(angle: &mut f32, torque: f32, friction: f32) {
            if torque > friction {
                *angle += 0.02;
            } else if torque < -friction {
                *angle -= 0.02;
            }
        }

        fn tick(&mut self, lp: &mut BalanceLoop, store: &mut ParameterStore) -> DriveCommand {
            let command = lp.tick(&self.frame(), self.now_ms, store);
            if let DriveCommand::Torque { left, right } = command {
                Self::spin(&mut self.left_rad, left, self.friction);
                Self::spin(&mut self.right_rad, right, self.friction);
            }
            self.now_ms += TICK_MS;
            command
        }

        fn run(&mut self, lp: &mut BalanceLoop, store: &mut ParameterStore, ticks: u32) {
            for _ in 0..ticks {
                self.tick(lp, store);
            }
        }

        fn run_until(
            &mut self,
            lp: &mut BalanceLoop,
            store: &mut ParameterStore,
            state: MotionState,
            max_ticks: u32,
        ) -> bool {
            for _ in 0..max_ticks {
                self.tick(lp, store);
                if lp.state() == state {
                    return true;
                }
            }
            false
        }

        fn command(&self, lp: &mut BalanceLoop, store: &mut ParameterStore, command: Command) {
            lp.apply_command(command, store, self.now_ms);
        }
    }

    /// Loop with a saved deadzone, settled in Idle
    fn calibrated() -> (BalanceLoop, ParameterStore, Bench) {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::new(0.4, 0.5)).unwrap();
        let mut lp = BalanceLoop::default();
        lp.init(&store);
        let mut bench = Bench::new();
        assert!(bench.run_until(&mut lp, &mut store, MotionState::Idle, 10));
        (lp, store, bench)
    }

    // ========== Startup Tests ==========

    #[test]
    fn test_first_boot_calibrates_and_persists_deadzone() {
        let mut store = ParameterStore::new();
        let mut lp = BalanceLoop::default();
        lp.init(&store);
        let mut bench = Bench::new();

        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Calibrating);

        let mut saw_left_only = false;
        let mut saw_right_only = false;
        for _ in 0..2_000 {
            if let DriveCommand::Torque { left, right } = bench.tick(&mut lp, &mut store) {
                saw_left_only |= left > 0.0 && right == 0.0;
                saw_right_only |= right > 0.0 && left == 0.0;
            }
            if lp.state() == MotionState::Idle {
                break;
            }
        }
        assert_eq!(lp.state(), MotionState::Idle);
        assert!(saw_left_only && saw_right_only);

        // 0.25 → 0.40 → 0.55 → 0.70 is the first torque above friction
        let saved = store.load_deadzone().expect("deadzone saved");
        assert!((saved.left - 0.70).abs() < 1e-4, "left = {}", saved.left);
        assert!((saved.right - 0.70).abs() < 1e-4, "right = {}", saved.right);
        assert_eq!(lp.robot().tor.deadzone, saved);
    }

    #[test]
    fn test_saved_deadzone_skips_calibration() {
        let (lp, _store, bench) = calibrated();
        assert_eq!(lp.robot().tor.deadzone, Deadzone::new(0.4, 0.5));
        assert!(bench.now_ms <= 2 * TICK_MS);
        assert!(bench.left_rad == 0.0 && bench.right_rad == 0.0);
    }

    #[test]
    fn test_init_loads_gyro_bias_and_pitch_zero() {
        let mut store = ParameterStore::new();
        store.save_gyro_bias(Vector3::new(0.1, -0.4, 0.0)).unwrap();
        store.save_pitch_zero(-1.5).unwrap();

        let mut lp = BalanceLoop::default();
        lp.init(&store);
        assert_eq!(lp.robot().gyro_base, Vector3::new(0.1, -0.4, 0.0));
        assert_eq!(lp.robot().pitch_zero, -1.5);
    }

    // ========== State Flow Tests ==========

    #[test]
    fn test_run_enables_balance_control() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::Run(true));
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Normal);

        bench.command(&mut lp, &mut store, Command::Run(false));
        let out = bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Idle);
        assert!(out.is_zero_torque());
    }

    #[test]
    fn test_estop_preempts_and_releases_to_idle() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::Run(true));
        bench.run(&mut lp, &mut store, 5);
        assert_eq!(lp.state(), MotionState::Normal);

        bench.command(&mut lp, &mut store, Command::EStop(true));
        for _ in 0..10 {
            assert!(bench.tick(&mut lp, &mut store).is_zero_torque());
            assert_eq!(lp.state(), MotionState::EStop);
        }

        bench.command(&mut lp, &mut store, Command::EStop(false));
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Idle);
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Normal);
    }

    #[test]
    fn test_sensor_fault_forces_recalibration() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.fault = true;
        let out = bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Fault);
        assert!(out.is_zero_torque());

        bench.fault = false;
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Calibrating);
        assert!(!lp.calibration().is_done());

        assert!(bench.run_until(&mut lp, &mut store, MotionState::Idle, 2_000));
        let saved = store.load_deadzone().unwrap();
        assert!((saved.left - 0.70).abs() < 1e-4);
    }

    #[test]
    fn test_recalibration_request_is_consumed() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::Run(true));
        bench.tick(&mut lp, &mut store);

        bench.command(&mut lp, &mut store, Command::RecalibrateDeadzone);
        assert!(!lp.robot().run);
        assert!(lp.robot().recalib_req);

        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Idle);
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Calibrating);
        assert!(!lp.robot().recalib_req);
        assert!(!lp.calibration().is_done());
    }

    #[test]
    fn test_low_battery_warns_then_shuts_down() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.battery_v = 11.0;
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::LowBat);
        assert!(lp.robot().lowbat_warn);
        assert!(lp.telemetry().lowbat_warn);

        bench.battery_v = 9.5;
        let out = bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Shutdown);
        assert!(out.is_zero_torque());
    }

    // ========== Fall Recovery Tests ==========

    #[test]
    fn test_fallen_swings_without_run() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.pitch_deg = 60.0;
        assert!(bench.run_until(&mut lp, &mut store, MotionState::Fallen, 1_500));
        assert!(!lp.robot().run);

        let mut swung = false;
        for _ in 0..50 {
            match bench.tick(&mut lp, &mut store) {
                DriveCommand::Torque { left, right } => {
                    assert_eq!(left, -right);
                    swung |= left != 0.0;
                }
                other => panic!("unexpected output {:?}", other),
            }
        }
        assert!(swung);
        assert_eq!(lp.state(), MotionState::Fallen);
    }

    #[test]
    fn test_swing_up_then_recover_to_normal() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.pitch_deg = 60.0;
        assert!(bench.run_until(&mut lp, &mut store, MotionState::Fallen, 1_500));

        bench.command(&mut lp, &mut store, Command::Run(true));
        let mut swung = false;
        for _ in 0..100 {
            if let DriveCommand::Torque { left, right } = bench.tick(&mut lp, &mut store) {
                if left != 0.0 {
                    assert_eq!(left, -right);
                    swung = true;
                }
            }
        }
        assert!(swung);
        assert_eq!(lp.state(), MotionState::Fallen);

        bench.pitch_deg = 0.0;
        assert!(bench.run_until(&mut lp, &mut store, MotionState::Normal, 3_000));
    }

    #[test]
    fn test_disabled_fall_detection_never_falls() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::FallDetection(false));
        bench.pitch_deg = 60.0;
        assert!(!bench.run_until(&mut lp, &mut store, MotionState::Fallen, 1_500));
        assert!(!lp.robot().fallen.enable);
    }

    // ========== Command Tests ==========

    #[test]
    fn test_test_mode_passes_override_through() {
        let (mut lp, mut store, mut bench) = calibrated();

        bench.command(&mut lp, &mut store, Command::SetMotor { left: 50.0, right: 50.0 });
        assert_eq!(lp.robot().test.left, TestSetpoint::Pwm(0));

        bench.command(&mut lp, &mut store, Command::TestMode(true));
        bench.command(&mut lp, &mut store, Command::SetMotor { left: 100.4, right: -2_000.0 });
        let out = bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Test);
        assert_eq!(
            out,
            DriveCommand::Test {
                left: TestSetpoint::Pwm(100),
                right: TestSetpoint::Pwm(-1_000),
            }
        );

        bench.command(&mut lp, &mut store, Command::TestMode(false));
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Idle);
        assert_eq!(lp.robot().test.left, TestSetpoint::Pwm(0));
    }

    #[test]
    fn test_test_mode_spinning_in_air_trips_off_ground() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::TestMode(true));
        bench.command(&mut lp, &mut store, Command::SetMotor { left: 500.0, right: 500.0 });
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.state(), MotionState::Test);
        assert_eq!(lp.robot().tor.left, 500.0);

        // 0.4 rad per 2 ms tick = 200 rad/s
        let mut tripped = false;
        for _ in 0..200 {
            bench.left_rad += 0.4;
            bench.right_rad += 0.4;
            bench.tick(&mut lp, &mut store);
            if lp.state() == MotionState::OffGround {
                tripped = true;
                break;
            }
        }
        assert!(tripped);
    }

    #[test]
    fn test_drive_mode_change_zeroes_setpoints() {
        let (mut lp, mut store, bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::TestMode(true));
        bench.command(&mut lp, &mut store, Command::SetMotor { left: 300.0, right: 300.0 });
        bench.command(&mut lp, &mut store, Command::SetDriveMode(DriveMode::Speed));
        assert_eq!(lp.robot().test.left, TestSetpoint::Speed(0.0));
        assert_eq!(lp.robot().test.mode, DriveMode::Speed);
    }

    #[test]
    fn test_joystick_watchdog_stops_motion() {
        let (mut lp, mut store, mut bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::Joystick { x: 0.2, y: 1.5 });
        bench.tick(&mut lp, &mut store);
        assert_eq!(lp.robot().joy.y, 1.0);
        assert!(!lp.robot().joy_stop_control);

        bench.run(&mut lp, &mut store, 300);
        assert!(lp.robot().joy_stop_control);
        assert_eq!(lp.robot().joy.x, 0.0);
        assert_eq!(lp.robot().joy.y, 0.0);
    }

    #[test]
    fn test_pitch_zero_parameter_persists() {
        let (mut lp, mut store, bench) = calibrated();
        bench.command(&mut lp, &mut store, Command::SetParam { key: ParamKey::PitchZero, value: -3.0 });
        assert_eq!(lp.robot().pitch_zero, -3.0);
        assert_eq!(store.load_pitch_zero(), Some(-3.0));
    }

    #[test]
    fn test_invalid_parameter_values_ignored() {
        let (mut lp, mut store, bench) = calibrated();
        let before = lp.robot().ang_pid;
        bench.command(&mut lp, &mut store, Command::SetParam { key: ParamKey::AngleP, value: f32::NAN });
        bench.command(&mut lp, &mut store, Command::SetParam { key: ParamKey::TorqueLimit, value: -1.0 });
        assert_eq!(lp.robot().ang_pid, before);
        assert_eq!(lp.robot().torque_limit, 25.0);

        bench.command(&mut lp, &mut store, Command::SetParam { key: ParamKey::SpeedP, value: 0.02 });
        assert_eq!(lp.robot().spd_pid.p, 0.02);
    }

    #[test]
    fn test_apply_params_updates_fall_detection() {
        let (mut lp, _store, _bench) = calibrated();
        let params = BalanceParams {
            fall_enable: false,
            torque_limit: 12.0,
            ..BalanceParams::default()
        };
        lp.apply_params(&params);
        assert!(!lp.robot().fallen.enable);
        assert_eq!(lp.robot().torque_limit, 12.0);
    }

    // ========== Hardware Tick Tests ==========

    struct MockImu {
        sample: ImuSample,
        fail: bool,
    }

    impl ImuSource for MockImu {
        fn read_imu(&mut self) -> Result<ImuSample, SensorError> {
            if self.fail {
                Err(SensorError::Timeout)
            } else {
                Ok(self.sample)
            }
        }
    }

    struct MockWheel(f32);

    impl AngleSensor for MockWheel {
        fn read_angle(&mut self) -> Result<f32, SensorError> {
            Ok(self.0)
        }
    }

    struct MockBattery(f32);

    impl BatterySource for MockBattery {
        fn voltage(&mut self) -> f32 {
            self.0
        }
    }

    #[derive(Default)]
    struct MockDrive {
        last: Option<DriveCommand>,
        applied: u32,
        fault: bool,
    }

    impl TorqueSink for MockDrive {
        fn apply(&mut self, command: &DriveCommand) -> Result<(), ActuatorError> {
            self.last = Some(*command);
            self.applied += 1;
            if self.fault {
                Err(ActuatorError::DriverFault)
            } else {
                Ok(())
            }
        }
    }

    struct MockHardware {
        imu: MockImu,
        left: MockWheel,
        right: MockWheel,
        battery: MockBattery,
        drive: MockDrive,
    }

    impl MockHardware {
        fn new() -> Self {
            Self {
                imu: MockImu {
                    sample: ImuSample::level(),
                    fail: false,
                },
                left: MockWheel(0.0),
                right: MockWheel(0.0),
                battery: MockBattery(12.4),
                drive: MockDrive::default(),
            }
        }
    }

    impl BalanceHardware for MockHardware {
        type Imu = MockImu;
        type Wheel = MockWheel;
        type Battery = MockBattery;
        type Drive = MockDrive;

        fn imu(&mut self) -> &mut MockImu {
            &mut self.imu
        }
        fn left_wheel(&mut self) -> &mut MockWheel {
            &mut self.left
        }
        fn right_wheel(&mut self) -> &mut MockWheel {
            &mut self.right
        }
        fn battery(&mut self) -> &mut MockBattery {
            &mut self.battery
        }
        fn drive(&mut self) -> &mut MockDrive {
            &mut self.drive
        }
    }

    fn run_ticks(
        lp: &mut BalanceLoop,
        hw: &mut MockHardware,
        store: &mut ParameterStore,
        time: &MockTime,
        ticks: u32,
    ) {
        for _ in 0..ticks {
            lp.run_tick(hw, store, time, core::iter::empty());
            time.advance_ms(TICK_MS);
        }
    }

    #[test]
    fn test_run_tick_drives_hardware_and_publishes() {
        static TELEMETRY: SharedTelemetry = SharedTelemetry::new();

        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::uniform(0.3)).unwrap();
        let mut hw = MockHardware::new();
        let time = MockTime::new();
        let mut lp = BalanceLoop::default();
        lp.attach_telemetry(&TELEMETRY);
        lp.init(&store);

        run_ticks(&mut lp, &mut hw, &mut store, &time, 5);
        assert_eq!(hw.drive.applied, 5);
        assert_eq!(lp.state(), MotionState::Idle);
        assert_eq!(lp.timer().stats().execution_count, 5);

        let published = TELEMETRY.latest();
        assert_eq!(published.state, MotionState::Idle);
        assert_eq!(published.timestamp_ms, 4 * TICK_MS);
        assert_eq!(published.battery_v, 12.4);
    }

    #[test]
    fn test_imu_failure_holds_sample_and_faults() {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::uniform(0.3)).unwrap();
        let mut hw = MockHardware::new();
        let time = MockTime::new();
        let mut lp = BalanceLoop::default();
        lp.init(&store);
        run_ticks(&mut lp, &mut hw, &mut store, &time, 3);

        hw.imu.fail = true;
        let frame = lp.read_frame(&mut hw);
        assert!(frame.fault);
        assert_eq!(frame.imu, ImuSample::level());

        run_ticks(&mut lp, &mut hw, &mut store, &time, 1);
        assert_eq!(lp.state(), MotionState::Fault);
        assert_eq!(hw.drive.last, Some(DriveCommand::ZERO));
    }

    #[test]
    fn test_driver_fault_reported_next_tick() {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::uniform(0.3)).unwrap();
        let mut hw = MockHardware::new();
        let time = MockTime::new();
        let mut lp = BalanceLoop::default();
        lp.init(&store);
        run_ticks(&mut lp, &mut hw, &mut store, &time, 3);
        assert_eq!(lp.state(), MotionState::Idle);

        hw.drive.fault = true;
        run_ticks(&mut lp, &mut hw, &mut store, &time, 1);
        assert_eq!(lp.state(), MotionState::Idle);
        run_ticks(&mut lp, &mut hw, &mut store, &time, 1);
        assert_eq!(lp.state(), MotionState::Fault);
    }

    #[test]
    fn test_queued_commands_apply_once() {
        let mut store = ParameterStore::new();
        store.save_deadzone(Deadzone::uniform(0.3)).unwrap();
        let mut hw = MockHardware::new();
        let time = MockTime::new();
        let mut lp = BalanceLoop::default();
        lp.init(&store);
        run_ticks(&mut lp, &mut hw, &mut store, &time, 3);

        let mut queue = crate::command::CommandQueue::new();
        crate::command::submit(&mut queue, Command::Run(true)).unwrap();
        crate::command::submit(&mut queue, Command::RecalibrateGyro).unwrap();
        lp.run_tick(&mut hw, &mut store, &time, core::iter::from_fn(|| queue.dequeue()));
        assert!(queue.dequeue().is_none());
        assert_eq!(lp.state(), MotionState::Normal);
        assert!(lp.robot().gyro_recalib_req);
    }
}
