//! Parameter persistence for SITL.
//!
//! `MemoryStore` keeps a core [`ParameterStore`] in memory and can write it
//! to a JSON file standing in for the robot's flash, so calibration results
//! survive between simulator runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use balbot_core::calibration::Deadzone;
use balbot_core::parameters::{
    BalanceParams, BatteryParams, ParamFlags, ParamValue, ParameterStore,
};
use balbot_core::traits::{CalibrationStore, StoreError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::SimulatorError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum StoredValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl From<ParamValue> for StoredValue {
    fn from(v: ParamValue) -> Self {
        match v {
            ParamValue::Bool(b) => StoredValue::Bool(b),
            ParamValue::Int(i) => StoredValue::Int(i),
            ParamValue::Float(f) => StoredValue::Float(f),
        }
    }
}

impl From<StoredValue> for ParamValue {
    fn from(v: StoredValue) -> Self {
        match v {
            StoredValue::Bool(b) => ParamValue::Bool(b),
            StoredValue::Int(i) => ParamValue::Int(i),
            StoredValue::Float(f) => ParamValue::Float(f),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredParam {
    value: StoredValue,
    #[serde(default)]
    flags: u8,
}

/// In-memory parameter store with optional JSON file backing.
pub struct MemoryStore {
    params: ParameterStore,
    path: Option<PathBuf>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Empty store, as on a freshly erased robot.
    pub fn new() -> Self {
        Self {
            params: ParameterStore::new(),
            path: None,
            fail_writes: false,
        }
    }

    /// Store with controller and battery defaults registered.
    pub fn with_defaults() -> Result<Self, SimulatorError> {
        let mut store = Self::new();
        BalanceParams::register_defaults(&mut store.params)?;
        BatteryParams::register_defaults(&mut store.params)?;
        store.params.clear_dirty();
        Ok(store)
    }

    /// Load `path` if it exists, otherwise start from defaults. Either way
    /// later [`flush`](Self::flush) calls write back to `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let path = path.as_ref();
        let mut store = if path.exists() {
            let store = Self::from_json(&fs::read_to_string(path)?)?;
            log::info!("Loaded {} parameters from {}", store.params.len(), path.display());
            store
        } else {
            log::info!("No parameter file at {}, using defaults", path.display());
            Self::with_defaults()?
        };
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    /// Make every calibration save fail, as a worn-out flash would.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn to_json(&self) -> Result<String, SimulatorError> {
        let map: BTreeMap<&str, StoredParam> = self
            .params
            .iter_all()
            .map(|(name, value)| {
                let flags = self
                    .params
                    .get_metadata(name.as_str())
                    .map(|meta| meta.flags.bits())
                    .unwrap_or(0);
                (
                    name.as_str(),
                    StoredParam {
                        value: (*value).into(),
                        flags,
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SimulatorError> {
        let map: BTreeMap<String, StoredParam> = serde_json::from_str(json)?;
        let mut store = Self::new();
        for (name, param) in map {
            let flags = ParamFlags::from_bits_truncate(param.flags);
            store.params.register(&name, param.value.into(), flags)?;
        }
        // Defaults fill in keys added since the file was written.
        BalanceParams::register_defaults(&mut store.params)?;
        BatteryParams::register_defaults(&mut store.params)?;
        store.params.clear_dirty();
        Ok(store)
    }

    /// Write the store to its backing file if anything changed.
    pub fn flush(&mut self) -> Result<bool, SimulatorError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(false);
        };
        if !self.params.is_dirty() {
            return Ok(false);
        }
        fs::write(path, self.to_json()?)?;
        log::debug!("Parameters written to {}", path.display());
        self.params.clear_dirty();
        Ok(true)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            Err(StoreError::WriteFailed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore for MemoryStore {
    fn load_deadzone(&self) -> Option<Deadzone> {
        self.params.load_deadzone()
    }

    fn save_deadzone(&mut self, deadzone: Deadzone) -> Result<(), StoreError> {
        self.check_writable()?;
        self.params.save_deadzone(deadzone)
    }

    fn load_gyro_bias(&self) -> Option<Vector3<f32>> {
        self.params.load_gyro_bias()
    }

    fn save_gyro_bias(&mut self, bias: Vector3<f32>) -> Result<(), StoreError> {
        self.check_writable()?;
        self.params.save_gyro_bias(bias)
    }

    fn load_pitch_zero(&self) -> Option<f32> {
        self.params.load_pitch_zero()
    }

    fn save_pitch_zero(&mut self, pitch_zero: f32) -> Result<(), StoreError> {
        self.check_writable()?;
        self.params.save_pitch_zero(pitch_zero)
    }
}
