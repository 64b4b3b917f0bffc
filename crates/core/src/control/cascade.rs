//! Speed → pitch → yaw cascade and wheel torque mixing
//!
//! The speed loop turns the joystick drive axis into a pitch offset, the
//! pitch loop turns the pitch error into a common torque, and the yaw loop
//! adds a differential term. Mixing then applies per-wheel deadzone
//! compensation and a joint clamp that preserves the left/right ratio.

use super::pid::{sanitize_dt, Pid};
use crate::ahrs::{wrap_degrees, DEG_TO_RAD};
use crate::calibration::Deadzone;
use crate::robot::{PidGains, RobotState};

#[derive(Debug, Clone, Copy)]
pub struct CascadeConfig {
    /// Bound on the pitch offset requested by the speed loop (deg)
    pub pitch_target_max_deg: f32,
    /// Low-pass coefficient for the damping gyro rate, in (0, 1]
    pub rate_filter_alpha: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            pitch_target_max_deg: 8.0,
            rate_filter_alpha: 0.3,
        }
    }
}

/// Pitch loop: P + trapezoidal I, gyro damping, gravity feed-forward and
/// back-calculation anti-windup.
#[derive(Debug, Clone, Default)]
pub struct PitchLoop {
    integral: f32,
    error_prev: f32,
    output_prev: f32,
    rate_filtered: f32,
    primed: bool,
}

/// Per-tick measurements the pitch loop needs beyond the error
#[derive(Debug, Clone, Copy)]
pub struct PitchSample {
    pub error: f32,
    pub pitch_deg: f32,
    pub pitch_zero_deg: f32,
    pub rate_dps: f32,
}

impl PitchLoop {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn update(
        &mut self,
        gains: &PidGains,
        sample: &PitchSample,
        torque_limit: f32,
        gravity_ff: f32,
        alpha: f32,
        dt_s: f32,
    ) -> f32 {
        let dt = sanitize_dt(dt_s);
        let limit = libm::fabsf(gains.limit).min(libm::fabsf(torque_limit));
        let error_prev = if self.primed {
            self.error_prev
        } else {
            sample.error
        };
        if self.primed {
            self.rate_filtered += alpha * (sample.rate_dps - self.rate_filtered);
        } else {
            self.rate_filtered = sample.rate_dps;
        }

        let p = gains.p * sample.error;
        self.integral += gains.i * dt * 0.5 * (sample.error + error_prev);
        let damping = -gains.d * self.rate_filtered;
        let gravity =
            -gravity_ff * libm::sinf((sample.pitch_deg - sample.pitch_zero_deg) * DEG_TO_RAD);

        let unsaturated = p + self.integral + damping + gravity;
        let mut output = if unsaturated > limit {
            self.integral -= unsaturated - limit;
            limit
        } else if unsaturated < -limit {
            self.integral += -limit - unsaturated;
            -limit
        } else {
            unsaturated
        };

        if gains.ramp > 0.0 {
            let max_step = gains.ramp * dt;
            output = output.clamp(self.output_prev - max_step, self.output_prev + max_step);
        }

        self.error_prev = sample.error;
        self.output_prev = output;
        self.primed = true;
        output
    }
}

/// Add deadzone compensation and clamp both wheels jointly.
///
/// A zero torque stays zero. When either magnitude exceeds `limit` both
/// are scaled by the same factor.
pub fn mix_torques(base: f32, yaw: f32, deadzone: &Deadzone, limit: f32) -> (f32, f32) {
    let compensate = |torque: f32, dz: f32| {
        if torque > 0.0 {
            torque + dz
        } else if torque < 0.0 {
            torque - dz
        } else {
            0.0
        }
    };

    let mut left = compensate(base - yaw, deadzone.left);
    let mut right = compensate(base + yaw, deadzone.right);

    let limit = libm::fabsf(limit);
    let peak = libm::fabsf(left).max(libm::fabsf(right));
    if peak > limit {
        let scale = if peak > 0.0 { limit / peak } else { 0.0 };
        left *= scale;
        right *= scale;
    }
    (left, right)
}

#[derive(Debug, Clone, Default)]
pub struct CascadeController {
    config: CascadeConfig,
    speed: Pid,
    pitch: PitchLoop,
    yaw: Pid,
    speed_target_prev: Option<f32>,
}

impl CascadeController {
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn pitch_loop(&self) -> &PitchLoop {
        &self.pitch
    }

    /// Run all three loops and mix. Returns `(left, right)` and records
    /// every intermediate in `robot`.
    pub fn update(&mut self, robot: &mut RobotState, dt_s: f32) -> (f32, f32) {
        let dt = sanitize_dt(dt_s);

        // Speed
        let spd = &mut robot.spd;
        spd.last = spd.now;
        spd.now = 0.5 * (robot.w_left + robot.w_right);
        spd.target = if robot.joy_stop_control {
            0.0
        } else {
            robot.joy.y * robot.joy.y_coef
        };
        spd.error = spd.target - spd.now;
        let feed_forward = match self.speed_target_prev {
            Some(prev) => robot.speed_ff * (spd.target - prev) / dt,
            None => 0.0,
        };
        self.speed_target_prev = Some(spd.target);
        let max = self.config.pitch_target_max_deg;
        spd.output = (self.speed.update(&robot.spd_pid, spd.error, dt) + feed_forward)
            .clamp(-max, max);

        // Pitch
        let ang = &mut robot.ang;
        ang.last = ang.now;
        ang.now = robot.imu.pitch;
        ang.target = robot.pitch_zero + robot.spd.output;
        ang.error = ang.target - ang.now;
        let sample = PitchSample {
            error: ang.error,
            pitch_deg: ang.now,
            pitch_zero_deg: robot.pitch_zero,
            rate_dps: robot.imu.pitch_rate(),
        };
        ang.output = self.pitch.update(
            &robot.ang_pid,
            &sample,
            robot.torque_limit,
            robot.gravity_ff,
            self.config.rate_filter_alpha,
            dt,
        );
        robot.tor.base = ang.output;

        // Yaw
        let yaw = &mut robot.yaw;
        yaw.target = robot.joy.x * robot.joy.x_coef;
        yaw.error = wrap_degrees(yaw.target - yaw.now);
        yaw.output = self.yaw.update(&robot.yaw_pid, yaw.error, dt);
        robot.tor.yaw = yaw.output;

        let (left, right) = mix_torques(
            robot.tor.base,
            robot.tor.yaw,
            &robot.tor.deadzone,
            robot.torque_limit,
        );
        robot.tor.left = left;
        robot.tor.right = right;
        (left, right)
    }

    /// Zero every loop's memory and output.
    pub fn reset(&mut self, robot: &mut RobotState) {
        self.speed.reset();
        self.pitch.reset();
        self.yaw.reset();
        self.speed_target_prev = None;

        robot.spd.output = 0.0;
        robot.ang.output = 0.0;
        robot.yaw.output = 0.0;
        robot.tor.base = 0.0;
        robot.tor.yaw = 0.0;
        robot.tor.left = 0.0;
        robot.tor.right = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const DT: f32 = 0.002;

    fn robot() -> RobotState {
        let mut robot = RobotState::new();
        robot.pitch_zero = 0.0;
        robot.tor.deadzone = Deadzone::uniform(0.0);
        robot
    }

    // ========== Mixing Tests ==========

    #[test]
    fn test_mix_adds_deadzone_with_sign() {
        let dz = Deadzone::new(0.2, 0.3);
        let (l, r) = mix_torques(1.0, 0.5, &dz, 25.0);
        assert!((l - 0.7).abs() < 1e-6);
        assert!((r - 1.8).abs() < 1e-6);

        let (l, r) = mix_torques(-1.0, 0.0, &dz, 25.0);
        assert!((l + 1.2).abs() < 1e-6);
        assert!((r + 1.3).abs() < 1e-6);
    }

    #[test]
    fn test_mix_zero_stays_zero() {
        let dz = Deadzone::uniform(0.25);
        assert_eq!(mix_torques(0.0, 0.0, &dz, 25.0), (0.0, 0.0));
        let (l, r) = mix_torques(0.5, 0.5, &dz, 25.0);
        assert_eq!(l, 0.0);
        assert!((r - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_mix_joint_scale_down() {
        let (l, r) = mix_torques(30.0, 10.0, &Deadzone::uniform(0.0), 25.0);
        assert!((r - 25.0).abs() < 1e-4);
        assert!((l - 12.5).abs() < 1e-4);
    }

    #[test]
    fn test_mix_bound_and_ratio_randomized() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..2000 {
            let base = rng.gen_range(-80.0f32..80.0);
            let yaw = rng.gen_range(-20.0f32..20.0);
            let dz = Deadzone::new(rng.gen_range(0.0f32..1.0), rng.gen_range(0.0f32..1.0));
            let limit = rng.gen_range(1.0f32..30.0);

            let (raw_l, raw_r) = mix_torques(base, yaw, &dz, f32::MAX);
            let (l, r) = mix_torques(base, yaw, &dz, limit);

            assert!(libm::fabsf(l) <= limit * (1.0 + 1e-5), "l = {}", l);
            assert!(libm::fabsf(r) <= limit * (1.0 + 1e-5), "r = {}", r);
            // Same sign, same ratio
            assert!(l * raw_l >= 0.0 && r * raw_r >= 0.0);
            if raw_l.abs() > 1e-3 && raw_r.abs() > 1e-3 {
                let before = raw_l / raw_r;
                let after = l / r;
                assert!((before - after).abs() <= 1e-3 * before.abs().max(1.0));
            }
        }
    }

    // ========== Pitch Loop Tests ==========

    #[test]
    fn test_pitch_error_drives_opposing_torque() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.imu.pitch = 5.0;
        let (l, r) = ctrl.update(&mut robot, DT);
        assert!(robot.tor.base < 0.0);
        assert_eq!(l, r);
        assert!(l < 0.0);
    }

    #[test]
    fn test_gyro_damping_opposes_rate() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.ang_pid = PidGains::new(0.0, 0.0, 0.1, 0.0, 250.0);
        robot.gravity_ff = 0.0;
        robot.imu.rate.y = 50.0;
        ctrl.update(&mut robot, DT);
        assert!((robot.tor.base + 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_gravity_feed_forward() {
        let mut pitch = PitchLoop::default();
        let gains = PidGains::new(0.0, 0.0, 0.0, 0.0, 250.0);
        let sample = PitchSample {
            error: 0.0,
            pitch_deg: 28.0,
            pitch_zero_deg: -2.0,
            rate_dps: 0.0,
        };
        let out = pitch.update(&gains, &sample, 25.0, 2.0, 0.3, DT);
        assert!((out + 1.0).abs() < 1e-4, "out = {}", out);
    }

    #[test]
    fn test_back_calculation_removes_exact_excess() {
        let mut pitch = PitchLoop::default();
        let gains = PidGains::new(1.0, 0.0, 0.0, 0.0, 250.0);
        let sample = PitchSample {
            error: 30.0,
            pitch_deg: 0.0,
            pitch_zero_deg: 0.0,
            rate_dps: 0.0,
        };
        let out = pitch.update(&gains, &sample, 25.0, 0.0, 0.3, DT);
        assert_eq!(out, 25.0);
        // p = 30, so the integral absorbs the 5 of excess
        assert!((pitch.integral() + 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_integral_does_not_wind_up_under_saturation() {
        let mut pitch = PitchLoop::default();
        let gains = PidGains::new(0.6, 5.0, 0.0, 0.0, 250.0);
        let sample = PitchSample {
            error: 20.0,
            pitch_deg: 0.0,
            pitch_zero_deg: 0.0,
            rate_dps: 0.0,
        };
        for _ in 0..5000 {
            let out = pitch.update(&gains, &sample, 25.0, 0.0, 0.3, DT);
            assert!(out <= 25.0);
        }
        // Output pinned at the limit: p + integral == limit
        assert!((0.6 * 20.0 + pitch.integral() - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_torque_limit_tightens_pitch_limit() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.torque_limit = 3.0;
        robot.imu.pitch = -20.0;
        let (l, r) = ctrl.update(&mut robot, DT);
        assert!(robot.tor.base <= 3.0);
        assert!(l.abs() <= 3.0 && r.abs() <= 3.0);
    }

    // ========== Speed / Yaw Loop Tests ==========

    #[test]
    fn test_speed_output_bounded_to_pitch_band() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.spd_pid = PidGains::new(10.0, 0.0, 0.0, 0.0, 100.0);
        robot.joy.y = 1.0;
        ctrl.update(&mut robot, DT);
        assert_eq!(robot.spd.target, 10.0);
        assert_eq!(robot.spd.output, 8.0);
        assert_eq!(robot.ang.target, 8.0);
    }

    #[test]
    fn test_joystick_stop_zeroes_speed_target() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.joy.y = 1.0;
        robot.joy_stop_control = true;
        ctrl.update(&mut robot, DT);
        assert_eq!(robot.spd.target, 0.0);
    }

    #[test]
    fn test_speed_feed_forward_on_target_change() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.spd_pid = PidGains::new(0.0, 0.0, 0.0, 0.0, 5.0);
        robot.speed_ff = 0.001;
        ctrl.update(&mut robot, DT);
        assert_eq!(robot.spd.output, 0.0);
        robot.joy.y = 0.1;
        ctrl.update(&mut robot, DT);
        // 1 rad/s step over 2 ms
        assert!((robot.spd.output - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_yaw_error_wraps() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.yaw.now = 179.0;
        robot.joy.x = -1.0;
        robot.joy.x_coef = 179.0;
        ctrl.update(&mut robot, DT);
        assert!((robot.yaw.error - 2.0).abs() < 1e-3);
        assert!(robot.tor.yaw > 0.0);
    }

    #[test]
    fn test_reset_zeroes_outputs() {
        let mut ctrl = CascadeController::default();
        let mut robot = robot();
        robot.imu.pitch = 10.0;
        ctrl.update(&mut robot, DT);
        assert!(robot.tor.left != 0.0);
        ctrl.reset(&mut robot);
        assert_eq!(robot.tor.left, 0.0);
        assert_eq!(robot.tor.right, 0.0);
        assert_eq!(ctrl.pitch_loop().integral(), 0.0);
    }
}
