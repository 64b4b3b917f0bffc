//! Priority-ordered transition function
//!
//! Priority, highest first:
//!
//! 1. E-stop
//! 2. Driver / sensor fault
//! 3. Battery empty (shutdown)
//! 4. Fallen
//! 5. Off-ground
//! 6. Low battery (with release hysteresis)
//! 7. Nominal per-state transitions

use super::state::MotionState;

/// Battery voltage thresholds (V)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryThresholds {
    /// At or below: LowBat warning
    pub warn: f32,
    /// At or below: Shutdown
    pub empty: f32,
    /// LowBat is released only at `warn + release_delta` or above
    pub release_delta: f32,
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self {
            warn: 11.1,
            empty: 10.0,
            release_delta: 0.3,
        }
    }
}

/// Snapshot of everything the state machine looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionInputs {
    pub run_cmd: bool,
    pub test_cmd: bool,
    /// Already masked by the off-ground protection setting
    pub off_ground: bool,
    pub fallen: bool,
    pub recover_ready: bool,
    pub calib_done: bool,
    pub estop: bool,
    pub drv_fault: bool,
    /// Pending deadzone recalibration request
    pub recalib_req: bool,
    pub battery_v: f32,
    pub battery: BatteryThresholds,
}

impl Default for MotionInputs {
    fn default() -> Self {
        Self {
            run_cmd: false,
            test_cmd: false,
            off_ground: false,
            fallen: false,
            recover_ready: false,
            calib_done: false,
            estop: false,
            drv_fault: false,
            recalib_req: false,
            battery_v: 12.6,
            battery: BatteryThresholds::default(),
        }
    }
}

/// Result of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionDecision {
    pub state: MotionState,
    /// Whether the balance cascade may drive the wheels this tick
    pub control_allowed: bool,
    pub lowbat_warn: bool,
}

impl MotionDecision {
    const fn new(state: MotionState, control_allowed: bool, lowbat_warn: bool) -> Self {
        Self {
            state,
            control_allowed,
            lowbat_warn,
        }
    }
}

/// Compute the next state.
///
/// Pure: the same `(current, inputs, now_ms)` always yields the same
/// decision.
pub fn step(current: MotionState, inputs: &MotionInputs, _now_ms: u64) -> MotionDecision {
    use MotionState::*;

    if inputs.estop {
        return MotionDecision::new(EStop, false, false);
    }
    if current == EStop {
        return MotionDecision::new(Idle, false, false);
    }

    if inputs.drv_fault {
        return MotionDecision::new(Fault, false, false);
    }
    if current == Fault {
        return MotionDecision::new(Calibrating, false, false);
    }

    if inputs.battery_v <= inputs.battery.empty {
        return MotionDecision::new(Shutdown, false, false);
    }

    if inputs.fallen {
        return MotionDecision::new(Fallen, false, false);
    }
    if current == Fallen && inputs.recover_ready {
        return MotionDecision::new(Calibrating, false, false);
    }

    if inputs.off_ground {
        return MotionDecision::new(OffGround, false, false);
    }
    if current == OffGround {
        let next = if inputs.run_cmd { Normal } else { Idle };
        return MotionDecision::new(next, inputs.run_cmd, false);
    }

    if inputs.battery_v <= inputs.battery.warn {
        return MotionDecision::new(LowBat, true, true);
    }
    if current == LowBat {
        if inputs.battery_v < inputs.battery.warn + inputs.battery.release_delta {
            return MotionDecision::new(LowBat, true, true);
        }
        let next = if inputs.run_cmd { Normal } else { Idle };
        return MotionDecision::new(next, inputs.run_cmd, false);
    }

    match current {
        Init => MotionDecision::new(Calibrating, true, false),
        Calibrating => {
            if inputs.calib_done {
                MotionDecision::new(Idle, false, false)
            } else {
                MotionDecision::new(Calibrating, true, false)
            }
        }
        Idle => {
            if inputs.recalib_req {
                MotionDecision::new(Calibrating, false, false)
            } else if inputs.test_cmd {
                MotionDecision::new(Test, true, false)
            } else if inputs.run_cmd {
                MotionDecision::new(Normal, true, false)
            } else {
                MotionDecision::new(Idle, false, false)
            }
        }
        Normal => {
            if inputs.test_cmd {
                MotionDecision::new(Test, true, false)
            } else if !inputs.run_cmd {
                MotionDecision::new(Idle, false, false)
            } else {
                MotionDecision::new(Normal, true, false)
            }
        }
        Test => {
            if inputs.test_cmd {
                MotionDecision::new(Test, true, false)
            } else {
                MotionDecision::new(Idle, false, false)
            }
        }
        // Exits for these are handled by the priority rules above
        OffGround | Fallen | EStop | Fault | Shutdown => MotionDecision::new(current, false, false),
        LowBat => MotionDecision::new(LowBat, true, true),
    }
}
