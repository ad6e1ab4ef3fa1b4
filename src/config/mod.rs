//! Persisted device configuration

mod settings;

pub use settings::{ButtonSettings, ConfigError, OutputBackend, Settings};
