//! Application settings and configuration management

use crate::alert::ALERT_BINDINGS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

/// Where spoken prompts are sent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Discard samples at playback speed (no sound card needed).
    #[default]
    Null,
    Alsa,
}

impl std::str::FromStr for OutputBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "null" => Ok(OutputBackend::Null),
            "alsa" => Ok(OutputBackend::Alsa),
            other => Err(ConfigError::ValidationError(format!("Unknown output backend '{}'", other))),
        }
    }
}

/// GPIO `value` files for the request buttons (active low), keyed by alert label.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ButtonSettings {
    #[serde(default)]
    pub paths: BTreeMap<String, PathBuf>,
    #[serde(default = "default_button_poll_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        ButtonSettings { paths: BTreeMap::new(), poll_interval_ms: default_button_poll_ms() }
    }
}

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Blink period; one tick toggles the active LED
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Ticks between spoken prompts while an alert stays active
    #[serde(default = "default_repeat_ticks")]
    pub repeat_ticks: u32,
    #[serde(default)]
    pub output_backend: OutputBackend,
    /// ALSA device used when `output_backend` is `alsa`
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// WAV recordings keyed by clip name; missing entries use a built-in chime
    #[serde(default)]
    pub clips: BTreeMap<String, PathBuf>,
    /// LED `brightness`/`value` files keyed by alert label; missing entries only log
    #[serde(default)]
    pub leds: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub buttons: ButtonSettings,
    /// Serial device to read keystrokes from; stdin when unset
    #[serde(default)]
    pub serial_device: Option<PathBuf>,
    /// How often the playback watcher checks transfer progress
    #[serde(default = "default_playback_poll_ms")]
    pub playback_poll_ms: u64,
    /// Extra time past a clip's duration before a transfer counts as stalled
    #[serde(default = "default_stall_grace_ms")]
    pub stall_grace_ms: u64,
}

fn default_tick_period_ms() -> u64 {
    500
}

fn default_repeat_ticks() -> u32 {
    20
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_button_poll_ms() -> u64 {
    10
}

fn default_playback_poll_ms() -> u64 {
    5
}

fn default_stall_grace_ms() -> u64 {
    2000
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tick_period_ms: default_tick_period_ms(),
            repeat_ticks: default_repeat_ticks(),
            output_backend: OutputBackend::default(),
            alsa_device: default_alsa_device(),
            clips: BTreeMap::new(),
            leds: BTreeMap::new(),
            buttons: ButtonSettings::default(),
            serial_device: None,
            playback_poll_ms: default_playback_poll_ms(),
            stall_grace_ms: default_stall_grace_ms(),
        }
    }
}

impl Settings {
    /// Load settings from a file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("carecall").join("config.json")
    }

    pub fn tick_period(&self) -> StdDuration {
        StdDuration::from_millis(self.tick_period_ms)
    }

    pub fn button_poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.buttons.poll_interval_ms)
    }

    pub fn playback_poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.playback_poll_ms)
    }

    pub fn stall_grace(&self) -> StdDuration {
        StdDuration::from_millis(self.stall_grace_ms)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ValidationError("Tick period must be greater than zero".to_string()));
        }
        if self.repeat_ticks == 0 {
            return Err(ConfigError::ValidationError("Repeat interval must be at least one tick".to_string()));
        }
        if self.playback_poll_ms == 0 || self.buttons.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError("Poll intervals must be greater than zero".to_string()));
        }
        if self.output_backend == OutputBackend::Alsa && self.alsa_device.is_empty() {
            return Err(ConfigError::ValidationError("ALSA device cannot be empty".to_string()));
        }
        for label in self.leds.keys().chain(self.buttons.paths.keys()) {
            if !ALERT_BINDINGS.iter().any(|b| b.label == label.as_str()) {
                return Err(ConfigError::ValidationError(format!("Unknown alert '{}'", label)));
            }
        }
        if let Some(name) = self.clips.keys().find(|name| !ALERT_BINDINGS.iter().any(|b| b.clip == name.as_str())) {
            return Err(ConfigError::ValidationError(format!("Unknown clip '{}'", name)));
        }
        Ok(())
    }
}
