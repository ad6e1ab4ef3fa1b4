use super::{RequestEvent, RequestOrigin, RequestSource};
use crate::alert::{AlertKind, ControllerEvent};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "carecall::request::button";

/// Falling-edge detector for an active-low button with a pull-up.
///
/// No debouncing: every high-to-low transition counts. The first sample only
/// primes the detector so a line that starts low does not fire.
#[derive(Debug, Default)]
pub struct ButtonEdgeDetector {
    last_high: Option<bool>,
}

impl ButtonEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one level sample; true on a falling edge.
    pub fn sample(&mut self, high: bool) -> bool {
        let falling = self.last_high == Some(true) && !high;
        self.last_high = Some(high);
        falling
    }
}

/// Parses a sysfs GPIO `value` file: "1" is high, "0" is low.
pub fn parse_gpio_level(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Polls a GPIO `value` file and posts a toggle request per press.
pub struct ButtonPoller {
    kind: AlertKind,
    path: PathBuf,
    poll_interval: StdDuration,
    detector: ButtonEdgeDetector,
}

impl ButtonPoller {
    pub fn new(kind: AlertKind, path: &Path, poll_interval: StdDuration) -> Self {
        ButtonPoller { kind, path: path.to_path_buf(), poll_interval, detector: ButtonEdgeDetector::new() }
    }
}

#[async_trait]
impl RequestSource for ButtonPoller {
    fn name(&self) -> String {
        format!("button:{}:{}", self.kind, self.path.display())
    }

    async fn run(mut self: Box<Self>, events: mpsc::Sender<ControllerEvent>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticks = interval(self.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut read_failing = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(target: LOG_TARGET, "Shutdown signal received, stopping {} button", self.kind);
                    return;
                }
                _ = ticks.tick() => {
                    let level = match tokio::fs::read_to_string(&self.path).await {
                        Ok(raw) => parse_gpio_level(&raw),
                        Err(e) => {
                            if !read_failing {
                                warn!(target: LOG_TARGET, "Cannot read {} button at {}: {}", self.kind, self.path.display(), e);
                            }
                            read_failing = true;
                            continue;
                        }
                    };
                    read_failing = false;

                    let Some(high) = level else {
                        debug!(target: LOG_TARGET, "Unexpected level in {}", self.path.display());
                        continue;
                    };
                    if self.detector.sample(high) {
                        info!(target: LOG_TARGET, "{} button pressed", self.kind);
                        let request = RequestEvent::toggle(self.kind, RequestOrigin::Button);
                        if events.send(ControllerEvent::Request(request)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
