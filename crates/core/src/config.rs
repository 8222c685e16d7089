use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::BindingTable;

/// Mixer connection settings plus the designated background-music source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MixerConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub music_source_name: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            password: String::new(),
            music_source_name: "[Alive]BGM".to_string(),
        }
    }
}

/// MIDI device selection and the persisted note → action map.
///
/// Bindings are kept as raw JSON values so one malformed entry cannot fail
/// the whole config load; [`BindingTable::from_persisted`] drops bad entries
/// with a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MidiConfig {
    pub device: String,
    #[serde(default)]
    pub bindings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub mixer: MixerConfig,
    #[serde(default)]
    pub midi: MidiConfig,
}

impl Settings {
    pub fn binding_table(&self) -> BindingTable {
        BindingTable::from_persisted(&self.midi.bindings)
    }

    pub fn set_bindings(&mut self, table: &BindingTable) {
        self.midi.bindings = table.to_persisted();
    }
}

/// Persisted configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to write config file: {0}")]
    Write(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

/// Loads and persists settings as JSON.
///
/// Defaults to `showdeck/config.json` under the platform config directory.
/// A missing file is created with defaults on first load; the settings
/// surface writes back through [`ConfigManager::update_settings`] on every
/// edit.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("showdeck").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        });

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, creating it with defaults
    /// if it does not exist.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}; using defaults for new settings",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
