//! Parameter storage
//!
//! Tunables and persisted calibration values live in one fixed-capacity
//! key-value store. Keys are short upper-case names (`BAL_ANG_P`,
//! `CAL_DZ_L`, ...). Calibration keys are registered hidden so they do not
//! show up in the tunable listing.

use super::error::ParameterError;
use bitflags::bitflags;
use heapless::index_map::FnvIndexMap;
use heapless::String;

/// Maximum parameter name length
pub const PARAM_NAME_LEN: usize = 16;

/// Maximum number of parameters
pub const MAX_PARAMS: usize = 64;

bitflags! {
    /// Parameter flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        /// Not listed with the tunables (calibration results)
        const HIDDEN = 0b00000001;
        /// Cannot be changed through `set`
        const READ_ONLY = 0b00000010;
    }
}

/// Parameter value types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl ParamValue {
    /// Numeric view of any variant
    pub fn as_f32(&self) -> f32 {
        match self {
            ParamValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            ParamValue::Int(v) => *v as f32,
            ParamValue::Float(v) => *v,
        }
    }

    /// Truth view of any variant; non-zero numbers are true
    pub fn as_bool(&self) -> bool {
        match self {
            ParamValue::Bool(v) => *v,
            ParamValue::Int(v) => *v != 0,
            ParamValue::Float(v) => *v != 0.0,
        }
    }
}

/// Parameter metadata
#[derive(Debug, Clone, Copy)]
pub struct ParamMetadata {
    pub flags: ParamFlags,
}

type Key = String<PARAM_NAME_LEN>;

fn make_key(name: &str) -> Result<Key, ParameterError> {
    let mut key = Key::new();
    key.push_str(name)
        .map_err(|_| ParameterError::NameTooLong)?;
    Ok(key)
}

/// Fixed-capacity parameter store
///
/// Values are registered once with a default and flags, then read and
/// updated by name. A dirty flag tracks unsaved changes for whichever
/// backend persists the store.
pub struct ParameterStore {
    parameters: FnvIndexMap<Key, ParamValue, MAX_PARAMS>,
    metadata: FnvIndexMap<Key, ParamMetadata, MAX_PARAMS>,
    dirty: bool,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            parameters: FnvIndexMap::new(),
            metadata: FnvIndexMap::new(),
            dirty: false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let key = make_key(name).ok()?;
        self.parameters.get(&key)
    }

    /// Numeric value of `name`, if registered
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get(name).map(ParamValue::as_f32)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(ParamValue::as_bool)
    }

    /// Update a registered parameter and mark the store dirty.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        let key = make_key(name)?;
        let flags = self
            .metadata
            .get(&key)
            .map(|meta| meta.flags)
            .ok_or(ParameterError::InvalidConfig)?;
        if flags.contains(ParamFlags::READ_ONLY) {
            return Err(ParameterError::ReadOnly);
        }

        self.parameters
            .insert(key, value)
            .map_err(|_| ParameterError::StoreFull)?;
        self.dirty = true;
        Ok(())
    }

    /// Register a parameter with its default. Existing values are kept.
    pub fn register(
        &mut self,
        name: &str,
        default_value: ParamValue,
        flags: ParamFlags,
    ) -> Result<(), ParameterError> {
        let key = make_key(name)?;
        if self.parameters.contains_key(&key) {
            return Ok(());
        }

        self.parameters
            .insert(key.clone(), default_value)
            .map_err(|_| ParameterError::StoreFull)?;
        self.metadata
            .insert(key, ParamMetadata { flags })
            .map_err(|_| ParameterError::StoreFull)?;
        self.dirty = true;
        Ok(())
    }

    /// Register if missing, then set.
    pub fn upsert(
        &mut self,
        name: &str,
        value: ParamValue,
        flags: ParamFlags,
    ) -> Result<(), ParameterError> {
        self.register(name, value, flags)?;
        self.set(name, value)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.get_metadata(name)
            .is_some_and(|meta| meta.flags.contains(ParamFlags::HIDDEN))
    }

    /// Names of all non-hidden parameters
    pub fn iter_names(&self) -> impl Iterator<Item = &String<PARAM_NAME_LEN>> {
        self.parameters
            .keys()
            .filter(|name| !self.is_hidden(name.as_str()))
    }

    /// Non-hidden parameter count
    pub fn count(&self) -> usize {
        self.iter_names().count()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the backend after a successful save
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Total count including hidden parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Every parameter, hidden ones included, for backends to serialize
    pub fn iter_all(&self) -> impl Iterator<Item = (&String<PARAM_NAME_LEN>, &ParamValue)> {
        self.parameters.iter()
    }

    pub fn get_metadata(&self, name: &str) -> Option<&ParamMetadata> {
        let key = make_key(name).ok()?;
        self.metadata.get(&key)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(name: &str, value: ParamValue, flags: ParamFlags) -> ParameterStore {
        let mut store = ParameterStore::new();
        store.register(name, value, flags).unwrap();
        store
    }

    #[test]
    fn test_parameter_store_new() {
        let store = ParameterStore::new();
        assert_eq!(store.count(), 0);
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_register_and_get() {
        let store = store_with("BAL_ANG_P", ParamValue::Float(0.6), ParamFlags::empty());
        assert_eq!(store.get("BAL_ANG_P"), Some(&ParamValue::Float(0.6)));
        assert_eq!(store.get_f32("BAL_ANG_P"), Some(0.6));
        assert_eq!(store.get("BAL_ANG_I"), None);
    }

    #[test]
    fn test_set_marks_dirty() {
        let mut store = store_with("BAL_TOR_LIM", ParamValue::Float(25.0), ParamFlags::empty());
        store.clear_dirty();
        store.set("BAL_TOR_LIM", ParamValue::Float(12.0)).unwrap();
        assert_eq!(store.get_f32("BAL_TOR_LIM"), Some(12.0));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_set_unknown_is_rejected() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.set("UNKNOWN", ParamValue::Int(1)),
            Err(ParameterError::InvalidConfig)
        );
    }

    #[test]
    fn test_name_too_long() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.register("A_VERY_LONG_PARAMETER", ParamValue::Int(1), ParamFlags::empty()),
            Err(ParameterError::NameTooLong)
        );
    }

    #[test]
    fn test_register_keeps_existing_value() {
        let mut store = store_with("BAL_SPD_P", ParamValue::Float(0.003), ParamFlags::empty());
        store.set("BAL_SPD_P", ParamValue::Float(0.01)).unwrap();
        store
            .register("BAL_SPD_P", ParamValue::Float(0.003), ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get_f32("BAL_SPD_P"), Some(0.01));
    }

    #[test]
    fn test_upsert_creates_and_updates() {
        let mut store = ParameterStore::new();
        store
            .upsert("CAL_PZERO", ParamValue::Float(-1.5), ParamFlags::HIDDEN)
            .unwrap();
        assert_eq!(store.get_f32("CAL_PZERO"), Some(-1.5));
        store
            .upsert("CAL_PZERO", ParamValue::Float(-1.0), ParamFlags::HIDDEN)
            .unwrap();
        assert_eq!(store.get_f32("CAL_PZERO"), Some(-1.0));
        assert!(store.is_hidden("CAL_PZERO"));
    }

    #[test]
    fn test_hidden_excluded_from_listing() {
        let mut store = store_with("BAL_YAW_P", ParamValue::Float(0.025), ParamFlags::empty());
        store
            .register("CAL_DZ_L", ParamValue::Float(0.25), ParamFlags::HIDDEN)
            .unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.len(), 2);
        let names: heapless::Vec<_, MAX_PARAMS> = store.iter_names().collect();
        assert_eq!(names[0].as_str(), "BAL_YAW_P");
    }

    #[test]
    fn test_read_only() {
        let mut store = store_with("FW_VERSION", ParamValue::Int(1), ParamFlags::READ_ONLY);
        assert_eq!(
            store.set("FW_VERSION", ParamValue::Int(2)),
            Err(ParameterError::ReadOnly)
        );
    }

    #[test]
    fn test_value_views() {
        assert_eq!(ParamValue::Bool(true).as_f32(), 1.0);
        assert_eq!(ParamValue::Int(3).as_f32(), 3.0);
        assert!(ParamValue::Float(0.5).as_bool());
        assert!(!ParamValue::Int(0).as_bool());
    }
}
