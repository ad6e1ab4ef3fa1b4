use crate::alert::state::ControllerEvent;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

const LOG_TARGET: &str = "carecall::alert::tick";

/// Periodic heartbeat that can be started and stopped.
///
/// `start` on a running source restarts its period. Every tick it emits
/// carries the `generation` it was started with.
pub trait TickSource: Send + Sync {
    fn start(&self, generation: u64);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Posts [`ControllerEvent::Tick`] onto the controller queue every period.
pub struct IntervalTicker {
    period: StdDuration,
    events: mpsc::Sender<ControllerEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalTicker {
    pub fn new(period: StdDuration, events: mpsc::Sender<ControllerEvent>) -> Self {
        IntervalTicker { period, events, task: Mutex::new(None) }
    }

    pub fn period(&self) -> StdDuration {
        self.period
    }
}

impl TickSource for IntervalTicker {
    fn start(&self, generation: u64) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(target: LOG_TARGET, "Cannot start ticker outside the async runtime: {}", e);
                return;
            }
        };
        let Ok(mut task) = self.task.lock() else {
            warn!(target: LOG_TARGET, "Ticker lock poisoned, not starting.");
            return;
        };
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let period = self.period;
        let events = self.events.clone();
        *task = Some(runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                trace!(target: LOG_TARGET, "Tick (generation {})", generation);
                if events.send(ControllerEvent::Tick(generation)).await.is_err() {
                    debug!(target: LOG_TARGET, "Controller queue closed, ticker exiting.");
                    break;
                }
            }
        }));
        debug!(target: LOG_TARGET, "Ticker started ({:?} period, generation {}).", period, generation);
    }

    fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                debug!(target: LOG_TARGET, "Ticker stopped.");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick source that only counts start/stop calls; ticks are injected by hand.
#[derive(Debug, Default)]
pub struct ManualTicker {
    starts: AtomicUsize,
    stops: AtomicUsize,
    last_generation: AtomicU64,
    running: Mutex<bool>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Generation passed to the most recent `start`.
    pub fn last_generation(&self) -> u64 {
        self.last_generation.load(Ordering::SeqCst)
    }
}

impl TickSource for ManualTicker {
    fn start(&self, generation: u64) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.last_generation.store(generation, Ordering::SeqCst);
        if let Ok(mut running) = self.running.lock() {
            *running = true;
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut running) = self.running.lock() {
            *running = false;
        }
    }

    fn is_running(&self) -> bool {
        self.running.lock().map(|r| *r).unwrap_or(false)
    }
}
