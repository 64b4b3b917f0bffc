//! Two-wheeled inverted pendulum simulator adapter.
//!
//! Built-in plant with no external dependencies, suitable for CI testing and
//! rapid iteration. Each wheel has a Coulomb-friction deadzone; the body is a
//! point-mass pendulum driven by the reaction of the net wheel torque. With
//! `supported` set the body is held on a stand and only the wheels move.

use std::f32::consts::{PI, TAU};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::adapter::capabilities::SimulatorCapabilities;
use crate::adapter::SimulatorAdapter;
use crate::error::SimulatorError;
use crate::types::{ActuatorCommands, ImuData, SensorData};

/// Configuration for the pendulum simulator.
#[derive(Debug, Clone)]
pub struct PendulumConfig {
    /// Simulation step size in microseconds.
    pub step_size_us: u64,
    /// Body held on a stand at `initial_pitch_deg`.
    pub supported: bool,
    /// Body pitch at connect, degrees (positive leans forward).
    pub initial_pitch_deg: f32,
    /// g / l of the body pendulum (1/s²).
    pub gravity_over_length: f32,
    /// Body angular acceleration per unit of net wheel torque (rad/s²).
    pub torque_coupling: f32,
    /// Viscous damping of the body (1/s).
    pub body_damping: f32,
    /// Body rests on the floor at this pitch, degrees.
    pub pitch_limit_deg: f32,
    /// Wheel angular acceleration per unit of net torque (rad/s²).
    pub wheel_gain: f32,
    /// Viscous drag on the wheels (1/s).
    pub wheel_drag: f32,
    /// Wheel speed saturation (rad/s).
    pub max_wheel_speed: f32,
    /// Torque needed to break each wheel loose, [left, right].
    pub static_friction: [f32; 2],
    pub wheel_radius_m: f32,
    pub track_width_m: f32,
    /// Constant gyroscope offset, deg/s.
    pub gyro_bias_dps: [f32; 3],
    /// Gyroscope noise standard deviation, deg/s.
    pub gyro_noise_dps: f32,
    /// Accelerometer noise standard deviation, g.
    pub accel_noise_g: f32,
    /// Pack voltage at connect.
    pub battery_v: f32,
    /// Linear discharge rate (V/s).
    pub battery_drain_v_per_s: f32,
    /// RNG seed for deterministic mode. None = random.
    pub seed: Option<u64>,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            step_size_us: 2_000, // 500 Hz
            supported: false,
            initial_pitch_deg: 0.0,
            gravity_over_length: 196.0,
            torque_coupling: 20.0,
            body_damping: 0.5,
            pitch_limit_deg: 80.0,
            wheel_gain: 600.0,
            wheel_drag: 2.0,
            max_wheel_speed: 1_000.0,
            static_friction: [0.6, 0.5],
            wheel_radius_m: 0.034,
            track_width_m: 0.17,
            gyro_bias_dps: [0.3, -0.5, 0.2],
            gyro_noise_dps: 0.05,
            accel_noise_g: 0.002,
            battery_v: 12.4,
            battery_drain_v_per_s: 0.0,
            seed: None,
        }
    }
}

impl PendulumConfig {
    /// Robot clamped on a bench stand, wheels in the air.
    pub fn on_stand() -> Self {
        Self {
            supported: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PlantState {
    /// Body pitch, rad.
    pitch: f32,
    pitch_rate: f32,
    /// Heading, rad.
    yaw: f32,
    yaw_rate: f32,
    wheel_speed: [f32; 2],
    wheel_angle: [f32; 2],
    torque: [f32; 2],
}

/// Pendulum simulator adapter with built-in wheel friction.
pub struct PendulumAdapter {
    config: PendulumConfig,
    name: String,
    state: PlantState,
    battery_v: f32,
    rng: StdRng,
    sim_time_us: u64,
    connected: bool,
}

impl PendulumAdapter {
    pub fn new(name: &str, config: PendulumConfig) -> Self {
        let rng = Self::make_rng(config.seed);
        let mut adapter = Self {
            battery_v: config.battery_v,
            config,
            name: name.to_string(),
            state: PlantState::default(),
            rng,
            sim_time_us: 0,
            connected: false,
        };
        adapter.reset();
        adapter
    }

    pub fn with_defaults() -> Self {
        Self::new("pendulum", PendulumConfig::default())
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn reset(&mut self) {
        self.state = PlantState {
            pitch: self.config.initial_pitch_deg.to_radians(),
            ..Default::default()
        };
        self.battery_v = self.config.battery_v;
        self.sim_time_us = 0;
        self.rng = Self::make_rng(self.config.seed);
    }

    /// Torque left after static friction; zero while stuck.
    fn drive_torque(&self, wheel: usize) -> f32 {
        let torque = self.state.torque[wheel];
        let friction = self.config.static_friction[wheel];
        if torque.abs() > friction {
            torque - friction.copysign(torque)
        } else {
            0.0
        }
    }

    fn integrate(&mut self, dt: f32) {
        let c = &self.config;
        let drive = [self.drive_torque(0), self.drive_torque(1)];

        for (wheel, &drive) in drive.iter().enumerate() {
            let speed = self.state.wheel_speed[wheel];
            let mut next = speed + (c.wheel_gain * drive - c.wheel_drag * speed) * dt;
            if drive == 0.0 {
                // Coulomb friction brings a coasting wheel to rest
                let stop = c.wheel_gain * c.static_friction[wheel] * dt;
                next = if next.abs() <= stop {
                    0.0
                } else {
                    next - stop.copysign(next)
                };
            }
            let next = next.clamp(-c.max_wheel_speed, c.max_wheel_speed);
            self.state.wheel_speed[wheel] = next;
            self.state.wheel_angle[wheel] = (self.state.wheel_angle[wheel] + next * dt).rem_euclid(TAU);
        }

        if c.supported {
            self.state.pitch = c.initial_pitch_deg.to_radians();
            self.state.pitch_rate = 0.0;
            self.state.yaw_rate = 0.0;
        } else {
            let net = 0.5 * (drive[0] + drive[1]);
            let accel = c.gravity_over_length * self.state.pitch.sin() + c.torque_coupling * net
                - c.body_damping * self.state.pitch_rate;
            self.state.pitch_rate += accel * dt;
            self.state.pitch += self.state.pitch_rate * dt;

            let limit = c.pitch_limit_deg.to_radians();
            if self.state.pitch.abs() >= limit {
                self.state.pitch = limit.copysign(self.state.pitch);
                if self.state.pitch_rate * self.state.pitch > 0.0 {
                    self.state.pitch_rate = 0.0;
                }
            }

            let [left, right] = self.state.wheel_speed;
            self.state.yaw_rate = (right - left) * c.wheel_radius_m / c.track_width_m;
            self.state.yaw = wrap_pi(self.state.yaw + self.state.yaw_rate * dt);
        }

        self.battery_v = (self.battery_v - c.battery_drain_v_per_s * dt).max(0.0);
    }

    fn synthesize_sensors(&mut self) -> SensorData {
        let (sin_p, cos_p) = self.state.pitch.sin_cos();
        let noise_g = self.config.accel_noise_g;
        let noise_dps = self.config.gyro_noise_dps;
        let bias = self.config.gyro_bias_dps;

        let accel_g = [
            -sin_p + self.gaussian_noise(noise_g),
            self.gaussian_noise(noise_g),
            cos_p + self.gaussian_noise(noise_g),
        ];
        let gyro_dps = [
            bias[0] + self.gaussian_noise(noise_dps),
            self.state.pitch_rate.to_degrees() + bias[1] + self.gaussian_noise(noise_dps),
            self.state.yaw_rate.to_degrees() + bias[2] + self.gaussian_noise(noise_dps),
        ];

        SensorData {
            timestamp_us: self.sim_time_us,
            imu: ImuData { accel_g, gyro_dps },
            wheel_angle_rad: self.state.wheel_angle,
            battery_v: self.battery_v,
        }
    }

    /// Generate Gaussian noise using Box-Muller transform.
    fn gaussian_noise(&mut self, stddev: f32) -> f32 {
        if stddev == 0.0 {
            return 0.0;
        }
        let u1: f32 = self.rng.gen::<f32>().max(f32::EPSILON);
        let u2: f32 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        z * stddev
    }

    fn ensure_connected(&self) -> Result<(), SimulatorError> {
        if self.connected {
            Ok(())
        } else {
            Err(SimulatorError::NotConnected(self.name.clone()))
        }
    }

    /// True body pitch in degrees.
    pub fn pitch_deg(&self) -> f32 {
        self.state.pitch.to_degrees()
    }

    pub fn pitch_rate_dps(&self) -> f32 {
        self.state.pitch_rate.to_degrees()
    }

    /// True wheel speeds in rad/s, [left, right].
    pub fn wheel_speed(&self) -> [f32; 2] {
        self.state.wheel_speed
    }

    pub fn battery_v(&self) -> f32 {
        self.battery_v
    }

    pub fn set_battery_v(&mut self, volts: f32) {
        self.battery_v = volts;
    }

    /// Put the body somewhere else, e.g. knock it over.
    pub fn set_pitch_deg(&mut self, pitch_deg: f32) {
        self.state.pitch = pitch_deg.to_radians();
        self.state.pitch_rate = 0.0;
    }

    /// Lift onto (or take off) the stand, keeping the current pitch.
    pub fn set_supported(&mut self, supported: bool) {
        self.config.supported = supported;
        if supported {
            self.config.initial_pitch_deg = self.pitch_deg();
        }
    }
}

impl std::fmt::Debug for PendulumAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendulumAdapter")
            .field("name", &self.name)
            .field("connected", &self.connected)
            .field("sim_time_us", &self.sim_time_us)
            .field("pitch_deg", &self.pitch_deg())
            .finish()
    }
}

#[async_trait]
impl SimulatorAdapter for PendulumAdapter {
    fn adapter_type(&self) -> &'static str {
        "pendulum"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), SimulatorError> {
        if self.config.step_size_us == 0 {
            return Err(SimulatorError::InvalidConfig(
                "step_size_us must be positive".to_string(),
            ));
        }
        self.reset();
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SimulatorError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn receive_sensors(&mut self) -> Result<Option<SensorData>, SimulatorError> {
        self.ensure_connected()?;
        Ok(Some(self.synthesize_sensors()))
    }

    async fn send_actuators(&mut self, commands: &ActuatorCommands) -> Result<(), SimulatorError> {
        self.ensure_connected()?;
        self.state.torque = commands.torque.map(|t| if t.is_finite() { t } else { 0.0 });
        Ok(())
    }

    async fn step(&mut self) -> Result<(), SimulatorError> {
        self.ensure_connected()?;
        let dt = self.config.step_size_us as f32 / 1_000_000.0;
        self.integrate(dt);
        self.sim_time_us += self.config.step_size_us;
        Ok(())
    }

    fn sim_time_us(&self) -> u64 {
        self.sim_time_us
    }

    fn step_size_us(&self) -> u64 {
        self.config.step_size_us
    }

    fn capabilities(&self) -> SimulatorCapabilities {
        SimulatorCapabilities {
            max_rate_hz: SimulatorCapabilities::rate_for_step(self.config.step_size_us),
            free_body: !self.config.supported,
            friction: self.config.static_friction.iter().any(|&f| f > 0.0),
            ..Default::default()
        }
    }
}

/// Normalize angle to [-pi, pi].
fn wrap_pi(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= TAU;
    }
    while angle < -PI {
        angle += TAU;
    }
    angle
}
