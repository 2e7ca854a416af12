//! Configuration Store, Runtime Settings and Pipeline Parameters
//!
//! ## Config Store
//!
//! The pipeline persists calibration arrays and tunable parameters through
//! the [`ConfigStore`] trait. The store is a plain string key/value space;
//! a missing key on load is never an error, defaults apply. [`MemoryStore`]
//! serves hosts and tests.
//!
//! ## Settings
//!
//! Tunable parameters are exposed as named settings in a [`SettingsMap`].
//! Each setting carries a typed current value and a validating closure; an
//! update is applied only when the candidate parses to the same variant and
//! the validator accepts it. Lookup is by the setting's literal name.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

use log::warn;

use crate::errors::ConfigError;

/// Persistent key/value storage consumed by the pipeline
///
/// Implementations wrap whatever the host offers (flash blobs, files, a
/// map). Transport and media failures surface as `false` from `save`;
/// `load` simply answers `None` for anything unreadable.
pub trait ConfigStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: &str) -> bool;
}

/// In-memory store for hosts and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) -> bool {
        self.entries.insert(key.to_owned(), value.to_owned());
        true
    }
}

/// Typed setting value, the variant doubles as the setting's type tag
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    /// Parse `input` into the same variant as `self`
    ///
    /// Booleans accept `1`/`0` alongside `true`/`false`, matching form
    /// submissions. Returns `None` when the input does not parse.
    pub fn parse_like(&self, input: &str) -> Option<SettingValue> {
        match self {
            SettingValue::Bool(_) => match input {
                "1" | "true" => Some(SettingValue::Bool(true)),
                "0" | "false" => Some(SettingValue::Bool(false)),
                _ => None,
            },
            SettingValue::Int(_) => input.parse().ok().map(SettingValue::Int),
            SettingValue::Text(_) => Some(SettingValue::Text(input.to_owned())),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            SettingValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            SettingValue::Int(v) => v.to_string(),
            SettingValue::Text(v) => v.clone(),
        }
    }
}

type Validator = Box<dyn Fn(&SettingValue) -> bool>;

/// One named setting: current value plus its validator
pub struct Setting {
    value: SettingValue,
    validate: Validator,
}

impl Setting {
    pub fn new(value: SettingValue, validate: impl Fn(&SettingValue) -> bool + 'static) -> Self {
        Self {
            value,
            validate: Box::new(validate),
        }
    }

    pub fn value(&self) -> &SettingValue {
        &self.value
    }
}

/// String-keyed settings registry with persistence helpers
#[derive(Default)]
pub struct SettingsMap {
    settings: BTreeMap<&'static str, Setting>,
}

impl SettingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: &'static str,
        value: SettingValue,
        validate: impl Fn(&SettingValue) -> bool + 'static,
    ) {
        self.settings.insert(key, Setting::new(value, validate));
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key).map(Setting::value)
    }

    /// Parse and apply one textual update
    ///
    /// Fails with [`ConfigError::UnknownSetting`] for an unregistered key and
    /// [`ConfigError::InvalidSetting`] when the input does not parse to the
    /// setting's variant or the validator rejects it. The prior value is kept
    /// on failure.
    pub fn apply(&mut self, key: &str, input: &str) -> Result<(), ConfigError> {
        let Some((name, setting)) = self.settings.get_key_value(key) else {
            return Err(ConfigError::UnknownSetting);
        };
        let name = *name;

        let Some(candidate) = setting.value.parse_like(input) else {
            return Err(ConfigError::InvalidSetting { key: name });
        };
        if !(setting.validate)(&candidate) {
            warn!("setting {name} rejected value {input:?}");
            return Err(ConfigError::InvalidSetting { key: name });
        }

        if let Some(setting) = self.settings.get_mut(key) {
            setting.value = candidate;
        }
        Ok(())
    }

    /// Persist every setting under its own key
    pub fn save_all(&self, store: &mut dyn ConfigStore) {
        for (key, setting) in &self.settings {
            if !store.save(key, &setting.value.render()) {
                warn!("failed to persist setting {key}");
            }
        }
    }

    /// Load stored values, keeping defaults for missing or invalid entries
    pub fn load_all(&mut self, store: &dyn ConfigStore) {
        let keys: alloc::vec::Vec<&'static str> = self.settings.keys().copied().collect();
        for key in keys {
            if let Some(stored) = store.load(key) {
                if self.apply(key, &stored).is_err() {
                    warn!("ignoring invalid stored value for setting {key}");
                }
            }
        }
    }
}

/// Construction-time pipeline parameters, validated once at setup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fixed channel count of every sample vector
    pub channels: usize,
    /// Maximum rows retained in history
    pub history_capacity: usize,
    /// Samples averaged into one normal-mode window
    pub sample_averaging: usize,
    /// Samples averaged during offset/scale calibration
    pub averaging_offset_scaling: usize,
    /// Minimum interval between forwarded reports, 0 disables
    pub reporting_interval_ms: u64,
    /// Change threshold in per mille, 0 disables
    pub threshold_permille: u32,
    /// Channel the threshold applies to, None = max delta over all
    pub threshold_channel: Option<usize>,
}

impl PipelineConfig {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            history_capacity: 50,
            sample_averaging: 10,
            averaging_offset_scaling: 25,
            reporting_interval_ms: 0,
            threshold_permille: 0,
            threshold_channel: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if self.history_capacity == 0 || self.sample_averaging == 0
            || self.averaging_offset_scaling == 0
        {
            return Err(ConfigError::ZeroCapacity);
        }
        if let Some(channel) = self.threshold_channel {
            if channel >= self.channels {
                return Err(ConfigError::InvalidSetting {
                    key: "threshold_channel",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SettingsMap {
        let mut settings = SettingsMap::new();
        settings.register("sample_averaging", SettingValue::Int(10), |v| {
            v.as_int().is_some_and(|n| n >= 1)
        });
        settings.register("threshold_permille", SettingValue::Int(0), |v| {
            v.as_int().is_some_and(|n| n >= 0)
        });
        settings.register("report_enabled", SettingValue::Bool(true), |_| true);
        settings
    }

    #[test]
    fn apply_validates_and_updates() {
        let mut settings = registry();

        settings.apply("sample_averaging", "4").unwrap();
        assert_eq!(settings.get("sample_averaging").unwrap().as_int(), Some(4));
    }

    #[test]
    fn rejected_update_keeps_prior_value() {
        let mut settings = registry();

        assert_eq!(
            settings.apply("sample_averaging", "0"),
            Err(ConfigError::InvalidSetting {
                key: "sample_averaging"
            })
        );
        assert_eq!(settings.get("sample_averaging").unwrap().as_int(), Some(10));
    }

    #[test]
    fn unparsable_input_is_invalid() {
        let mut settings = registry();

        assert!(settings.apply("sample_averaging", "ten").is_err());
        assert!(settings.apply("report_enabled", "maybe").is_err());
        settings.apply("report_enabled", "0").unwrap();
        assert_eq!(settings.get("report_enabled").unwrap().as_bool(), Some(false));
    }

    #[test]
    fn unknown_key_is_distinct_error() {
        let mut settings = registry();
        assert_eq!(
            settings.apply("no_such_setting", "1"),
            Err(ConfigError::UnknownSetting)
        );
    }

    #[test]
    fn settings_round_trip_through_store() {
        let mut store = MemoryStore::new();
        let mut settings = registry();
        settings.apply("sample_averaging", "7").unwrap();
        settings.save_all(&mut store);

        let mut fresh = registry();
        fresh.load_all(&store);
        assert_eq!(fresh.get("sample_averaging").unwrap().as_int(), Some(7));
    }

    #[test]
    fn load_all_skips_invalid_stored_values() {
        let mut store = MemoryStore::new();
        store.save("sample_averaging", "0");

        let mut settings = registry();
        settings.load_all(&store);
        assert_eq!(settings.get("sample_averaging").unwrap().as_int(), Some(10));
    }

    #[test]
    fn missing_key_loads_default() {
        let store = MemoryStore::new();
        let mut settings = registry();
        settings.load_all(&store);
        assert_eq!(settings.get("threshold_permille").unwrap().as_int(), Some(0));
    }

    #[test]
    fn pipeline_config_validation() {
        assert!(PipelineConfig::new(2).validate().is_ok());
        assert_eq!(
            PipelineConfig::new(0).validate(),
            Err(ConfigError::ZeroChannels)
        );

        let mut config = PipelineConfig::new(1);
        config.history_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn threshold_channel_must_be_in_range() {
        let mut config = PipelineConfig::new(1);
        config.threshold_permille = 100;
        config.threshold_channel = Some(3);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSetting {
                key: "threshold_channel"
            })
        );

        config.threshold_channel = Some(0);
        assert!(config.validate().is_ok());
    }
}
