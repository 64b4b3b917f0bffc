//! PID with trapezoidal integration and output slew limiting
//!
//! Gains are passed on every update so changes made through the command
//! surface take effect on the next tick without touching controller memory.

use crate::robot::PidGains;

/// Fallback step when the caller's dt is unusable (s)
pub const FALLBACK_DT_S: f32 = 1e-3;
/// Longest step accepted as-is (s)
pub const MAX_DT_S: f32 = 0.5;

/// Replace a non-positive, non-finite or too-long step with 1 ms.
pub fn sanitize_dt(dt_s: f32) -> f32 {
    if dt_s.is_finite() && dt_s > 0.0 && dt_s <= MAX_DT_S {
        dt_s
    } else {
        FALLBACK_DT_S
    }
}

/// Controller memory for one axis.
#[derive(Debug, Clone, Default)]
pub struct Pid {
    integral: f32,
    error_prev: f32,
    output_prev: f32,
    primed: bool,
}

impl Pid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear integrator, derivative history and ramp memory.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn output(&self) -> f32 {
        self.output_prev
    }

    /// One control step on `error` over `dt_s` seconds.
    ///
    /// The integral is clamped to `gains.limit`, the sum of terms is
    /// clamped to `gains.limit`, and the change from the previous output
    /// is bounded by `gains.ramp * dt` when `ramp > 0`.
    pub fn update(&mut self, gains: &PidGains, error: f32, dt_s: f32) -> f32 {
        let dt = sanitize_dt(dt_s);
        let limit = libm::fabsf(gains.limit);
        let error_prev = if self.primed { self.error_prev } else { error };

        let p = gains.p * error;

        self.integral += gains.i * dt * 0.5 * (error + error_prev);
        self.integral = self.integral.clamp(-limit, limit);

        let d = gains.d * (error - error_prev) / dt;

        let mut output = (p + self.integral + d).clamp(-limit, limit);

        if gains.ramp > 0.0 {
            let max_step = gains.ramp * dt;
            output = output.clamp(self.output_prev - max_step, self.output_prev + max_step);
        }

        self.error_prev = error;
        self.output_prev = output;
        self.primed = true;
        output
    }
}
