//! Wheel deadzone calibration
//!
//! Staged procedure: Reset → Left → Right → Done. In each wheel stage a
//! test torque is applied to that wheel alone, starting at `torque_start`
//! and stepping up every `step_hold_ms`, until the wheel turns faster than
//! `velocity_threshold`. The torque that first moved the wheel becomes its
//! deadzone. A wheel that never moves before the stage timeout or the
//! torque ceiling keeps `fallback`.
//!
//! Any non-quiescent tick zeroes the output and restarts the current stage.

use crate::log_info;

/// Static-friction compensation per wheel (Nm)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    pub left: f32,
    pub right: f32,
}

impl Deadzone {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub const fn uniform(value: f32) -> Self {
        Self::new(value, value)
    }
}

impl Default for Deadzone {
    fn default() -> Self {
        Self::uniform(CalibrationConfig::DEFAULT_FALLBACK)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationConfig {
    /// |pitch| must stay below this (deg)
    pub quiet_pitch_deg: f32,
    /// |pitch rate| must stay below this (deg/s)
    pub quiet_rate_dps: f32,
    /// Wheel speed that counts as "moving" (rad/s)
    pub velocity_threshold: f32,
    pub torque_start: f32,
    pub torque_step: f32,
    pub torque_max: f32,
    pub step_hold_ms: u64,
    pub stage_timeout_ms: u64,
    pub fallback: f32,
}

impl CalibrationConfig {
    pub const DEFAULT_FALLBACK: f32 = 0.25;
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            quiet_pitch_deg: 8.0,
            quiet_rate_dps: 20.0,
            velocity_threshold: 6.0,
            torque_start: 0.25,
            torque_step: 0.15,
            torque_max: 3.0,
            step_hold_ms: 40,
            stage_timeout_ms: 1200,
            fallback: Self::DEFAULT_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibStage {
    Reset,
    Left,
    Right,
    Done,
}

/// Signals sampled once per tick
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationInputs {
    pub pitch_deg: f32,
    pub pitch_rate_dps: f32,
    pub speed_left: f32,
    pub speed_right: f32,
}

/// Output of one calibration tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStep {
    pub torque_left: f32,
    pub torque_right: f32,
    /// Working deadzone values (fallback until measured)
    pub deadzone: Deadzone,
    /// Set exactly once, on the tick the procedure finishes
    pub completed: Option<Deadzone>,
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
    stage: CalibStage,
    stage_start_ms: u64,
    last_step_ms: u64,
    test_torque: f32,
    /// Torque sent on the previous tick of the stage
    applied: f32,
    working: Deadzone,
    valid: Option<Deadzone>,
    force: bool,
    done: bool,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            stage: CalibStage::Reset,
            stage_start_ms: 0,
            last_step_ms: 0,
            test_torque: 0.0,
            applied: 0.0,
            working: Deadzone::uniform(config.fallback),
            valid: None,
            force: false,
            done: false,
        }
    }

    pub fn stage(&self) -> CalibStage {
        self.stage
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Current working values
    pub fn deadzone(&self) -> Deadzone {
        self.working
    }

    /// Accept a persisted result.
    ///
    /// With `saved` present and `force` false the engine is done without
    /// running a stage. Returns the deadzone the controller should use.
    pub fn load_saved(&mut self, saved: Option<Deadzone>, force: bool) -> Deadzone {
        self.force = force;
        match saved {
            Some(dz) if !force => {
                self.valid = Some(dz);
                self.working = dz;
                self.done = true;
            }
            Some(dz) => {
                self.valid = Some(dz);
                self.done = false;
            }
            None => {
                self.done = false;
            }
        }
        self.working
    }

    /// Rewind to the Reset stage.
    ///
    /// Short-circuits to done when a valid result exists and `force` is
    /// false.
    pub fn restart(&mut self, force: bool) {
        self.stage = CalibStage::Reset;
        self.stage_start_ms = 0;
        self.last_step_ms = 0;
        self.test_torque = 0.0;
        self.applied = 0.0;
        self.force = force;
        self.done = self.valid.is_some() && !force;
    }

    pub fn step(&mut self, input: &CalibrationInputs, now_ms: u64) -> CalibrationStep {
        if self.done {
            return self.output(0.0, 0.0, None);
        }

        if self.stage == CalibStage::Reset {
            self.stage = CalibStage::Left;
            self.begin_stage(now_ms);
            self.working = Deadzone::uniform(self.config.fallback);
            log_info!("deadzone calibration started");
        }

        let quiet = libm::fabsf(input.pitch_deg) < self.config.quiet_pitch_deg
            && libm::fabsf(input.pitch_rate_dps) < self.config.quiet_rate_dps;
        if !quiet {
            self.begin_stage(now_ms);
            return self.output(0.0, 0.0, None);
        }

        match self.stage {
            CalibStage::Left => {
                let torque = self.test_torque;
                if libm::fabsf(input.speed_left) > self.config.velocity_threshold {
                    self.working.left = libm::fabsf(self.applied);
                    log_info!("left deadzone measured: {}", self.working.left);
                    self.advance(CalibStage::Right, now_ms);
                    return self.output(0.0, 0.0, None);
                }
                if self.stage_expired(now_ms) {
                    log_info!("left wheel did not move, keeping fallback deadzone");
                    self.advance(CalibStage::Right, now_ms);
                    return self.output(0.0, 0.0, None);
                }
                self.applied = torque;
                self.ramp(now_ms);
                self.output(torque, 0.0, None)
            }
            CalibStage::Right => {
                let torque = self.test_torque;
                if libm::fabsf(input.speed_right) > self.config.velocity_threshold {
                    self.working.right = libm::fabsf(self.applied);
                    log_info!("right deadzone measured: {}", self.working.right);
                    self.advance(CalibStage::Done, now_ms);
                    return self.output(0.0, 0.0, None);
                }
                if self.stage_expired(now_ms) {
                    log_info!("right wheel did not move, keeping fallback deadzone");
                    self.advance(CalibStage::Done, now_ms);
                    return self.output(0.0, 0.0, None);
                }
                self.applied = torque;
                self.ramp(now_ms);
                self.output(0.0, torque, None)
            }
            CalibStage::Done => {
                self.done = true;
                self.force = false;
                self.valid = Some(self.working);
                log_info!(
                    "deadzone calibration complete: left={} right={}",
                    self.working.left,
                    self.working.right
                );
                self.output(0.0, 0.0, Some(self.working))
            }
            CalibStage::Reset => self.output(0.0, 0.0, None),
        }
    }

    fn begin_stage(&mut self, now_ms: u64) {
        self.stage_start_ms = now_ms;
        self.last_step_ms = now_ms;
        self.test_torque = self.config.torque_start;
        self.applied = self.config.torque_start;
    }

    fn advance(&mut self, next: CalibStage, now_ms: u64) {
        self.stage = next;
        self.begin_stage(now_ms);
    }

    fn stage_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stage_start_ms) > self.config.stage_timeout_ms
            || self.test_torque > self.config.torque_max
    }

    fn ramp(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_step_ms) >= self.config.step_hold_ms {
            self.last_step_ms = now_ms;
            self.test_torque += self.config.torque_step;
        }
    }

    fn output(&self, left: f32, right: f32, completed: Option<Deadzone>) -> CalibrationStep {
        CalibrationStep {
            torque_left: left,
            torque_right: right,
            deadzone: self.working,
            completed,
        }
    }
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}
