//! Fall recovery: open-loop swing-up followed by a soft closed-loop takeover
//!
//! While fallen (and asked to run) the wheels are driven with an opposing
//! sinusoidal torque whose amplitude decays towards a floor. Once pitch
//! is back inside the exit angle the balance cascade takes over, its output
//! scaled by a gain that ramps linearly from 0 to 1.

use core::f32::consts::PI;

use crate::log_info;

#[derive(Debug, Clone, Copy)]
pub struct SwingUpConfig {
    pub frequency_hz: f32,
    /// Initial amplitude (Nm)
    pub max_torque: f32,
    /// Amplitude floor (Nm)
    pub min_torque: f32,
    /// Amplitude decay rate (1/s)
    pub decay: f32,
    /// |pitch| below this counts as upright (deg)
    pub exit_pitch_deg: f32,
}

impl Default for SwingUpConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1.2,
            max_torque: 6.0,
            min_torque: 2.5,
            decay: 0.2,
            exit_pitch_deg: 25.0,
        }
    }
}

/// Sinusoidal swing generator
#[derive(Debug, Clone, Default)]
pub struct SwingUp {
    config: SwingUpConfig,
    start_ms: Option<u64>,
}

/// Result of one swing tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwingOutput {
    Swing { left: f32, right: f32 },
    /// Pitch is inside the exit angle; the swing timer has been reset
    Upright,
}

impl SwingUp {
    pub fn new(config: SwingUpConfig) -> Self {
        Self {
            config,
            start_ms: None,
        }
    }

    pub fn config(&self) -> &SwingUpConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.start_ms = None;
    }

    /// Amplitude `t_s` seconds into the swing
    pub fn amplitude(&self, t_s: f32) -> f32 {
        let c = &self.config;
        let decayed = c.max_torque * (0.4 + 0.6 * libm::expf(-c.decay * t_s));
        decayed.max(c.min_torque)
    }

    pub fn update(&mut self, pitch_deg: f32, now_ms: u64) -> SwingOutput {
        if libm::fabsf(pitch_deg) < self.config.exit_pitch_deg {
            self.start_ms = None;
            return SwingOutput::Upright;
        }

        let start = *self.start_ms.get_or_insert(now_ms);
        let t = now_ms.saturating_sub(start) as f32 / 1000.0;
        let omega = 2.0 * PI * self.config.frequency_hz;
        let u = self.amplitude(t) * libm::sinf(omega * t);
        SwingOutput::Swing {
            left: -u,
            right: u,
        }
    }
}

/// Linear 0 → 1 gain ramp after a successful swing-up
#[derive(Debug, Clone)]
pub struct SoftTakeover {
    duration_ms: u64,
    start_ms: Option<u64>,
}

impl SoftTakeover {
    pub const DEFAULT_DURATION_MS: u64 = 600;

    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            start_ms: None,
        }
    }

    pub fn start(&mut self, now_ms: u64) {
        self.start_ms = Some(now_ms);
    }

    pub fn cancel(&mut self) {
        self.start_ms = None;
    }

    /// Deactivates once the ramp has run its full duration.
    pub fn is_active(&mut self, now_ms: u64) -> bool {
        match self.start_ms {
            Some(start) if now_ms.saturating_sub(start) > self.duration_ms => {
                self.start_ms = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Output scale in [0, 1]; 1.0 when inactive.
    pub fn gain(&mut self, now_ms: u64) -> f32 {
        let Some(start) = self.start_ms else {
            return 1.0;
        };
        let k = now_ms.saturating_sub(start) as f32 / self.duration_ms.max(1) as f32;
        if k >= 1.0 {
            self.start_ms = None;
            return 1.0;
        }
        k
    }
}

impl Default for SoftTakeover {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Swinging,
    Holding,
}

/// What the loop should output while fallen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryAction {
    /// Open-loop swing torques
    Swing { left: f32, right: f32 },
    /// Swing just succeeded; output zero this tick
    Upright,
    /// Run the cascade scaled by `gain`
    Hold { gain: f32 },
}

/// Swing-up and takeover sequencing for the fallen state
#[derive(Debug, Clone)]
pub struct Recovery {
    swing: SwingUp,
    takeover: SoftTakeover,
    phase: RecoveryPhase,
}

impl Recovery {
    pub fn new(swing: SwingUpConfig, takeover_ms: u64) -> Self {
        Self {
            swing: SwingUp::new(swing),
            takeover: SoftTakeover::new(takeover_ms),
            phase: RecoveryPhase::Swinging,
        }
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Back to swinging. Any takeover ramp in progress is left running.
    pub fn reset(&mut self) {
        self.swing.reset();
        self.phase = RecoveryPhase::Swinging;
    }

    /// Current takeover gain; 1.0 once the ramp has finished.
    pub fn takeover_gain(&mut self, now_ms: u64) -> f32 {
        self.takeover.gain(now_ms)
    }

    pub fn takeover_active(&mut self, now_ms: u64) -> bool {
        self.takeover.is_active(now_ms)
    }

    pub fn update(&mut self, pitch_deg: f32, now_ms: u64) -> RecoveryAction {
        match self.phase {
            RecoveryPhase::Swinging => match self.swing.update(pitch_deg, now_ms) {
                SwingOutput::Swing { left, right } => RecoveryAction::Swing { left, right },
                SwingOutput::Upright => {
                    log_info!("Swing-up succeeded at pitch {} deg", pitch_deg);
                    self.takeover.start(now_ms);
                    self.phase = RecoveryPhase::Holding;
                    RecoveryAction::Upright
                }
            },
            RecoveryPhase::Holding => {
                if libm::fabsf(pitch_deg) >= self.swing.config().exit_pitch_deg {
                    self.takeover.cancel();
                    self.phase = RecoveryPhase::Swinging;
                    return self.update(pitch_deg, now_ms);
                }
                RecoveryAction::Hold {
                    gain: self.takeover.gain(now_ms),
                }
            }
        }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new(SwingUpConfig::default(), SoftTakeover::DEFAULT_DURATION_MS)
    }
}
