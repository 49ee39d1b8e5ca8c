// Session store settings
// Loads and saves the tunables (write timing, undo capacity, privacy level,
// logging) as JSON at the platform config path and updates single values by
// dot-separated key.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::SessionSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<SessionSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &SessionSettings;
    fn get_value(&self, key: &str) -> Result<Value, SettingsError>;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings persisted as pretty-printed JSON.
pub struct SettingsEngine {
    config_path: String,
    settings: SessionSettings,
}

impl SettingsEngine {
    /// Uses `path_override` when given, otherwise `settings.json` in the
    /// platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string()
        });

        Self {
            config_path,
            settings: SessionSettings::default(),
        }
    }

    fn to_json(&self) -> Result<Value, SettingsError> {
        serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })
    }

    fn split_key(key: &str) -> Result<Vec<&str>, SettingsError> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(SettingsError::InvalidKey(format!("'{}'", key)));
        }
        Ok(key.split('.').collect())
    }
}

/// Follows a dot path through nested objects.
fn lookup_mut<'a>(root: &'a mut Value, parts: &[&str]) -> Option<&'a mut Value> {
    parts
        .iter()
        .try_fold(root, |node, part| node.as_object_mut()?.get_mut(*part))
}

impl SettingsEngineTrait for SettingsEngine {
    /// Missing file means defaults; a malformed file is an error.
    fn load(&mut self) -> Result<SessionSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            debug!(path = %self.config_path, "no settings file, using defaults");
            self.settings = SessionSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        info!(path = %self.config_path, "settings loaded");
        Ok(self.settings.clone())
    }

    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// An empty key returns the whole settings object.
    fn get_value(&self, key: &str) -> Result<Value, SettingsError> {
        let mut json = self.to_json()?;
        if key.is_empty() {
            return Ok(json);
        }
        let parts = Self::split_key(key)?;
        lookup_mut(&mut json, &parts)
            .map(|v| v.take())
            .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))
    }

    /// Updates one value by dot path (`"saving.interval_ms"`,
    /// `"privacy.level"`), validates the result by deserializing it, and
    /// saves to disk.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let parts = Self::split_key(key)?;
        let mut json = self.to_json()?;

        let target = lookup_mut(&mut json, &parts)
            .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        if target.is_object() {
            return Err(SettingsError::InvalidKey(format!(
                "Key '{}' names a section, not a value",
                key
            )));
        }
        *target = value;

        self.settings = serde_json::from_value(json).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        debug!(key, "setting updated");

        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = SessionSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
