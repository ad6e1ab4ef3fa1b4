//! Integration tests for configuration management
//!
//! These verify that the configuration system works correctly
//! across module boundaries.

use carecall::config::{ConfigError, OutputBackend, Settings};
use carecall::ui::Args;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// File settings, then command-line overrides, then validation
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{
                "tick_period_ms": 250,
                "output_backend": "alsa",
                "alsa_device": "hw:1,0",
                "leds": { "water": "/sys/class/leds/blue/brightness" },
                "buttons": { "paths": { "washroom": "/sys/class/gpio/gpio17/value" } },
                "clips": { "restroom": "/opt/carecall/restroom.wav" }
            }"#,
        )?;

        let mut settings = Settings::load(&config_path)?;
        assert_eq!(settings.tick_period_ms, 250);
        assert_eq!(settings.repeat_ticks, 20);
        assert_eq!(settings.output_backend, OutputBackend::Alsa);
        assert_eq!(settings.leds.get("water"), Some(&PathBuf::from("/sys/class/leds/blue/brightness")));
        assert!(!settings.leds.contains_key("washroom"));
        assert_eq!(settings.buttons.paths.get("washroom"), Some(&PathBuf::from("/sys/class/gpio/gpio17/value")));
        assert_eq!(settings.buttons.poll_interval_ms, 10);

        let args = Args::try_parse_from([
            "carecall",
            "--backend",
            "null",
            "--repeat-ticks",
            "6",
            "--serial",
            "/dev/ttyUSB0",
            "--clip",
            "water=/opt/carecall/water.wav",
        ])?;
        args.apply_to(&mut settings)?;
        settings.validate()?;

        assert_eq!(settings.output_backend, OutputBackend::Null);
        assert_eq!(settings.repeat_ticks, 6);
        assert_eq!(settings.serial_device, Some(PathBuf::from("/dev/ttyUSB0")));
        assert_eq!(settings.clips.len(), 2);
        // Untouched by the command line
        assert_eq!(settings.alsa_device, "hw:1,0");
        assert_eq!(settings.clips.get("restroom"), Some(&PathBuf::from("/opt/carecall/restroom.wav")));

        settings.save(&config_path)?;
        assert_eq!(Settings::load(&config_path)?, settings);
        Ok(())
    }

    /// Invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let zero_tick = Settings { tick_period_ms: 0, ..Settings::default() };
        match zero_tick.validate() {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("Tick period")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut overridden = Settings::default();
        let args = Args::try_parse_from(["carecall", "--repeat-ticks", "0"]).unwrap();
        args.apply_to(&mut overridden).unwrap();
        assert!(overridden.validate().is_err());

        let alsa_without_device =
            Settings { output_backend: OutputBackend::Alsa, alsa_device: String::new(), ..Settings::default() };
        assert!(alsa_without_device.validate().is_err());

        let mut stray_led = Settings::default();
        stray_led.leds.insert("kitchen".to_string(), PathBuf::from("/sys/class/leds/green/brightness"));
        assert!(matches!(stray_led.validate(), Err(ConfigError::ValidationError(msg)) if msg.contains("kitchen")));
    }

    #[test]
    fn test_unknown_backend_in_file_is_parse_error() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "output_backend": "pulse" }"#)?;

        assert!(matches!(Settings::load(&config_path), Err(ConfigError::ParseError(_))));
        Ok(())
    }
}
