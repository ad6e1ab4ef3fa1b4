//! Command-line interface implementation

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use crate::alert::ALERT_BINDINGS;
use crate::config::{ConfigError, Settings};

/// Command-line arguments for carecall
#[derive(Parser, Debug)]
#[command(author, version, about = "Two-button water/washroom call device", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, env = "CARECALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Audio output backend: "null" or "alsa"
    #[arg(short, long, env = "CARECALL_BACKEND")]
    pub backend: Option<String>,

    /// ALSA device to use
    #[arg(short = 'd', long, env = "CARECALL_ALSA_DEVICE")]
    pub alsa_device: Option<String>,

    /// Serial device to read W/T keystrokes from (defaults to the terminal)
    #[arg(short, long, env = "CARECALL_SERIAL")]
    pub serial: Option<PathBuf>,

    /// WAV recording for a prompt, as NAME=PATH (e.g. water=/opt/water.wav); repeatable
    #[arg(long = "clip", value_name = "NAME=PATH", value_parser = parse_clip_override)]
    pub clips: Vec<(String, PathBuf)>,

    /// Ticks between spoken prompts
    #[arg(long)]
    pub repeat_ticks: Option<u32>,

    /// Keep the terminal in line mode (requests need Enter)
    #[arg(long)]
    pub no_raw: bool,

    /// Emit logs as JSON
    #[arg(long, env = "CARECALL_LOG_JSON")]
    pub log_json: bool,
}

fn parse_clip_override(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name.to_string(), PathBuf::from(path))),
        _ => Err(format!("expected NAME=PATH, got '{}'", raw)),
    }
}

impl Args {
    /// Overrides file settings with whatever was given on the command line.
    pub fn apply_to(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        if let Some(backend) = &self.backend {
            settings.output_backend = backend.parse()?;
        }
        if let Some(device) = &self.alsa_device {
            settings.alsa_device = device.clone();
        }
        if let Some(serial) = &self.serial {
            settings.serial_device = Some(serial.clone());
        }
        for (name, path) in &self.clips {
            settings.clips.insert(name.clone(), path.clone());
        }
        if let Some(ticks) = self.repeat_ticks {
            settings.repeat_ticks = ticks;
        }
        Ok(())
    }
}

/// CLI user interface for the device console
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Print the startup banner with the active bindings
    pub fn display_banner(&self, settings: &Settings) {
        // Raw mode needs explicit carriage returns.
        print!("=== carecall: assistive call device ===\r\n");
        for binding in &ALERT_BINDINGS {
            print!(
                "  [{}] toggle {} alert (prompt '{}')\r\n",
                binding.keys.first().map_or('?', |&k| k as char),
                binding.label,
                binding.clip
            );
        }
        print!(
            "  blink every {} ms, prompt every {} ticks, audio: {:?}\r\n",
            settings.tick_period_ms, settings.repeat_ticks, settings.output_backend
        );
        print!("  Ctrl+C to quit\r\n");
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprint!("Error: {}\r\n", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
