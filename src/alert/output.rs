use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const LOG_TARGET: &str = "carecall::alert::output";

/// On/off indicator line.
///
/// Called from inside the controller's critical section, so implementations
/// must return quickly and never call back into the controller.
pub trait OutputChannel: Send + Sync {
    fn set(&self, on: bool);
    fn name(&self) -> &str;
}

/// Channel that only logs its level; used when no LED is wired up.
#[derive(Debug)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: &str) -> Self {
        LogChannel { name: name.to_string() }
    }
}

impl OutputChannel for LogChannel {
    fn set(&self, on: bool) {
        debug!(target: LOG_TARGET, "LED {} {}", self.name, if on { "ON" } else { "OFF" });
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Drives a sysfs LED `brightness` or GPIO `value` file.
#[derive(Debug)]
pub struct SysfsChannel {
    name: String,
    path: PathBuf,
}

impl SysfsChannel {
    pub fn new(name: &str, path: &Path) -> Self {
        SysfsChannel { name: name.to_string(), path: path.to_path_buf() }
    }
}

impl OutputChannel for SysfsChannel {
    fn set(&self, on: bool) {
        // LED faults must not stop the state machine; the next tick retries.
        if let Err(e) = std::fs::write(&self.path, if on { "1" } else { "0" }) {
            warn!(target: LOG_TARGET, "Failed to drive LED {} via {}: {}", self.name, self.path.display(), e);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Remembers every command it receives.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    name: String,
    history: Mutex<Vec<bool>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        RecordingChannel { name: name.to_string(), history: Mutex::new(Vec::new()) }
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Level after the last command; off if never commanded.
    pub fn is_on(&self) -> bool {
        self.history().last().copied().unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }
}

impl OutputChannel for RecordingChannel {
    fn set(&self, on: bool) {
        if let Ok(mut history) = self.history.lock() {
            history.push(on);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
