//! Balance Controller Parameter Definitions
//!
//! # Parameters
//!
//! - `BAL_ANG_P/I/D/RAMP/LIM` - Pitch loop (D is the gyro damping gain)
//! - `BAL_SPD_P/I/D/RAMP/LIM` - Speed loop
//! - `BAL_YAW_P/I/D/RAMP/LIM` - Yaw loop
//! - `BAL_TOR_LIM` - Joint wheel torque clamp
//! - `BAL_SPD_FF` - Speed target feed-forward gain
//! - `BAL_GRAV_FF` - Gravity compensation gain
//! - `BAL_JOY_XCOEF`, `BAL_JOY_YCOEF` - Joystick scale per axis
//! - `BAL_FALL_EN` - Fall detection enable
//! - `BAL_OFFGND_EN` - Off-ground protection enable

use super::error::ParameterError;
use super::storage::{ParamFlags, ParamValue, ParameterStore, PARAM_NAME_LEN};
use crate::robot::{Joystick, PidGains, RobotState};

const AXES: [(&str, fn(&BalanceParams) -> PidGains); 3] = [
    ("BAL_ANG", |p| p.angle),
    ("BAL_SPD", |p| p.speed),
    ("BAL_YAW", |p| p.yaw),
];

const GAIN_SUFFIXES: [&str; 5] = ["_P", "_I", "_D", "_RAMP", "_LIM"];

/// Parameter name for `prefix` + `suffix`, e.g. `BAL_ANG` + `_P`
fn gain_name(
    prefix: &str,
    suffix: &str,
) -> Result<heapless::String<PARAM_NAME_LEN>, ParameterError> {
    let mut name = heapless::String::new();
    name.push_str(prefix)
        .and_then(|_| name.push_str(suffix))
        .map_err(|_| ParameterError::NameTooLong)?;
    Ok(name)
}

fn gain_values(g: &PidGains) -> [f32; 5] {
    [g.p, g.i, g.d, g.ramp, g.limit]
}

fn load_gains(store: &ParameterStore, prefix: &str, fallback: PidGains) -> PidGains {
    let mut v = gain_values(&fallback);
    for (slot, suffix) in v.iter_mut().zip(GAIN_SUFFIXES) {
        let Ok(name) = gain_name(prefix, suffix) else {
            continue;
        };
        if let Some(x) = store.get_f32(name.as_str()) {
            *slot = x;
        }
    }
    PidGains::new(v[0], v[1], v[2], v[3], v[4])
}

/// Controller tunables loaded from parameter store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceParams {
    pub angle: PidGains,
    pub speed: PidGains,
    pub yaw: PidGains,
    pub torque_limit: f32,
    pub speed_ff: f32,
    pub gravity_ff: f32,
    pub joy_x_coef: f32,
    pub joy_y_coef: f32,
    pub fall_enable: bool,
    pub offground_protect: bool,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self::capture(&RobotState::new())
    }
}

impl BalanceParams {
    /// Register controller parameters with default values
    pub fn register_defaults(store: &mut ParameterStore) -> Result<(), ParameterError> {
        Self::default().register(store)
    }

    fn register(&self, store: &mut ParameterStore) -> Result<(), ParameterError> {
        for (prefix, gains) in AXES {
            for (value, suffix) in gain_values(&gains(self)).into_iter().zip(GAIN_SUFFIXES) {
                let name = gain_name(prefix, suffix)?;
                store.register(name.as_str(), ParamValue::Float(value), ParamFlags::empty())?;
            }
        }
        let f = ParamFlags::empty();
        store.register("BAL_TOR_LIM", ParamValue::Float(self.torque_limit), f)?;
        store.register("BAL_SPD_FF", ParamValue::Float(self.speed_ff), f)?;
        store.register("BAL_GRAV_FF", ParamValue::Float(self.gravity_ff), f)?;
        store.register("BAL_JOY_XCOEF", ParamValue::Float(self.joy_x_coef), f)?;
        store.register("BAL_JOY_YCOEF", ParamValue::Float(self.joy_y_coef), f)?;
        store.register("BAL_FALL_EN", ParamValue::Bool(self.fall_enable), f)?;
        store.register("BAL_OFFGND_EN", ParamValue::Bool(self.offground_protect), f)?;
        Ok(())
    }

    /// Load controller parameters, falling back to defaults for missing keys
    pub fn from_store(store: &ParameterStore) -> Self {
        let d = Self::default();
        Self {
            angle: load_gains(store, "BAL_ANG", d.angle),
            speed: load_gains(store, "BAL_SPD", d.speed),
            yaw: load_gains(store, "BAL_YAW", d.yaw),
            torque_limit: store.get_f32("BAL_TOR_LIM").unwrap_or(d.torque_limit),
            speed_ff: store.get_f32("BAL_SPD_FF").unwrap_or(d.speed_ff),
            gravity_ff: store.get_f32("BAL_GRAV_FF").unwrap_or(d.gravity_ff),
            joy_x_coef: store.get_f32("BAL_JOY_XCOEF").unwrap_or(d.joy_x_coef),
            joy_y_coef: store.get_f32("BAL_JOY_YCOEF").unwrap_or(d.joy_y_coef),
            fall_enable: store.get_bool("BAL_FALL_EN").unwrap_or(d.fall_enable),
            offground_protect: store.get_bool("BAL_OFFGND_EN").unwrap_or(d.offground_protect),
        }
    }

    /// Current tunables of a running robot
    pub fn capture(robot: &RobotState) -> Self {
        Self {
            angle: robot.ang_pid,
            speed: robot.spd_pid,
            yaw: robot.yaw_pid,
            torque_limit: robot.torque_limit,
            speed_ff: robot.speed_ff,
            gravity_ff: robot.gravity_ff,
            joy_x_coef: robot.joy.x_coef,
            joy_y_coef: robot.joy.y_coef,
            fall_enable: robot.fallen.enable,
            offground_protect: robot.offground_protect,
        }
    }

    /// Copy the tunables into `robot`. Joystick axes are left alone.
    pub fn apply(&self, robot: &mut RobotState) {
        robot.ang_pid = self.angle;
        robot.spd_pid = self.speed;
        robot.yaw_pid = self.yaw;
        robot.torque_limit = self.torque_limit;
        robot.speed_ff = self.speed_ff;
        robot.gravity_ff = self.gravity_ff;
        robot.joy = Joystick {
            x_coef: self.joy_x_coef,
            y_coef: self.joy_y_coef,
            ..robot.joy
        };
        robot.fallen.enable = self.fall_enable;
        robot.offground_protect = self.offground_protect;
    }

    /// Write every value back, registering keys that are missing.
    pub fn save(&self, store: &mut ParameterStore) -> Result<(), ParameterError> {
        self.register(store)?;
        for (prefix, gains) in AXES {
            for (value, suffix) in gain_values(&gains(self)).into_iter().zip(GAIN_SUFFIXES) {
                store.set(gain_name(prefix, suffix)?.as_str(), ParamValue::Float(value))?;
            }
        }
        store.set("BAL_TOR_LIM", ParamValue::Float(self.torque_limit))?;
        store.set("BAL_SPD_FF", ParamValue::Float(self.speed_ff))?;
        store.set("BAL_GRAV_FF", ParamValue::Float(self.gravity_ff))?;
        store.set("BAL_JOY_XCOEF", ParamValue::Float(self.joy_x_coef))?;
        store.set("BAL_JOY_YCOEF", ParamValue::Float(self.joy_y_coef))?;
        store.set("BAL_FALL_EN", ParamValue::Bool(self.fall_enable))?;
        store.set("BAL_OFFGND_EN", ParamValue::Bool(self.offground_protect))?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.torque_limit > 0.0 && self.angle.limit > 0.0
    }
}
