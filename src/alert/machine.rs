use crate::alert::output::OutputChannel;
use crate::alert::state::{AlertKind, AlertMode, AlertSnapshot, AlertUpdate, TickOutcome, ALERT_BINDINGS, ALERT_KIND_COUNT};
use crate::alert::tick::TickSource;
use crate::audio::{PlaybackError, PlaybackOrchestrator};
use crate::request::RequestEvent;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace, warn};

const LOG_TARGET: &str = "carecall::alert::machine";

pub const DEFAULT_REPEAT_TICKS: u32 = 20;
const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct AlertState {
    mode: AlertMode,
    blink_on: bool,
    repeat_counter: u32,
    /// Bumped on every ticker start or stop; ticks from older runs are dropped.
    tick_generation: u64,
}

/// Single-active-alert state machine.
///
/// Mode, blink phase and repeat counter live behind one mutex; every request
/// and every tick is one critical section, with the channel commands issued
/// inside it so no interleaving can leave both indicators lit.
pub struct AlertController {
    state: Mutex<AlertState>,
    channels: [Arc<dyn OutputChannel>; ALERT_KIND_COUNT],
    ticker: Arc<dyn TickSource>,
    playback: Option<Arc<PlaybackOrchestrator>>,
    repeat_ticks: u32,
    updates: broadcast::Sender<AlertUpdate>,
}

impl AlertController {
    /// Creates an idle controller with every channel forced off.
    pub fn new(channels: [Arc<dyn OutputChannel>; ALERT_KIND_COUNT], ticker: Arc<dyn TickSource>) -> Self {
        for channel in &channels {
            channel.set(false);
        }
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        AlertController {
            state: Mutex::new(AlertState::default()),
            channels,
            ticker,
            playback: None,
            repeat_ticks: DEFAULT_REPEAT_TICKS,
            updates,
        }
    }

    /// Enables the spoken prompt every `repeat_ticks` ticks.
    pub fn with_playback(mut self, playback: Arc<PlaybackOrchestrator>, repeat_ticks: u32) -> Self {
        self.playback = Some(playback);
        self.repeat_ticks = repeat_ticks.max(1);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertUpdate> {
        self.updates.subscribe()
    }

    pub fn repeat_ticks(&self) -> u32 {
        self.repeat_ticks
    }

    fn lock(&self) -> MutexGuard<'_, AlertState> {
        // State is plain data and every critical section leaves it consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn channel(&self, kind: AlertKind) -> &dyn OutputChannel {
        self.channels[kind.binding().channel].as_ref()
    }

    fn publish(&self, update: AlertUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let state = self.lock();
        AlertSnapshot { mode: state.mode, blink_on: state.blink_on, repeat_counter: state.repeat_counter }
    }

    pub fn handle_request(&self, request: RequestEvent) -> AlertMode {
        debug!(target: LOG_TARGET, "Request from {:?}: toggle {}", request.origin, request.kind);
        self.toggle(request.kind)
    }

    /// Applies a toggle request and returns the resulting mode.
    ///
    /// Requesting the active alert cancels it; requesting any other alert
    /// replaces whatever is active.
    #[instrument(skip(self))]
    pub fn toggle(&self, kind: AlertKind) -> AlertMode {
        let (from, to) = {
            let mut state = self.lock();
            let from = state.mode;

            if from == AlertMode::Alert(kind) {
                for channel in &self.channels {
                    channel.set(false);
                }
                state.mode = AlertMode::Idle;
                state.blink_on = false;
                state.repeat_counter = 0;
                state.tick_generation += 1;
                self.ticker.stop();
                info!(target: LOG_TARGET, "{} alert cancelled", kind);
            } else {
                if let Some(previous) = from.active_kind() {
                    self.channel(previous).set(false);
                    info!(target: LOG_TARGET, "Cancelled {} alert, starting {} alert", previous, kind);
                }
                self.channel(kind).set(true);
                state.mode = AlertMode::Alert(kind);
                state.blink_on = true;
                state.repeat_counter = 0;
                state.tick_generation += 1;
                self.ticker.start(state.tick_generation);
                info!(target: LOG_TARGET, "{} alert started", kind);
            }
            (from, state.mode)
        };

        self.publish(AlertUpdate::ModeChanged { from, to });
        to
    }

    /// Generation of the current ticker run.
    pub fn tick_generation(&self) -> u64 {
        self.lock().tick_generation
    }

    /// Heartbeat: blinks the active channel and paces the spoken prompt.
    ///
    /// Safe to call while idle (a tick racing a cancellation does nothing).
    pub fn on_tick(&self) -> TickOutcome {
        self.apply_tick(None)
    }

    /// Queued heartbeat from the ticker run started as `generation`.
    ///
    /// A tick posted before the alert was restarted, replaced or cancelled is
    /// dropped, so a fresh alert always shows its first state for a full period.
    pub fn handle_tick(&self, generation: u64) -> TickOutcome {
        self.apply_tick(Some(generation))
    }

    fn apply_tick(&self, generation: Option<u64>) -> TickOutcome {
        let outcome = {
            let mut state = self.lock();
            if let Some(generation) = generation.filter(|&g| g != state.tick_generation) {
                trace!(target: LOG_TARGET, "Stale tick from generation {} dropped (current {})", generation, state.tick_generation);
                return TickOutcome::default();
            }
            let Some(kind) = state.mode.active_kind() else {
                trace!(target: LOG_TARGET, "Tick while idle ignored");
                return TickOutcome::default();
            };

            state.blink_on = !state.blink_on;
            self.channel(kind).set(state.blink_on);

            let mut playback = None;
            if self.playback.is_some() {
                state.repeat_counter += 1;
                if state.repeat_counter >= self.repeat_ticks {
                    state.repeat_counter = 0;
                    playback = Some(kind.binding().clip);
                }
            }
            TickOutcome { blink: Some(state.blink_on), playback }
        };

        if let Some(clip) = outcome.playback {
            self.dispatch_playback(clip);
        }
        outcome
    }

    // Runs outside the state lock; audio is best effort and never touches the alert state.
    fn dispatch_playback(&self, clip: &'static str) {
        let Some(playback) = &self.playback else {
            return;
        };

        match playback.start(clip) {
            Ok(handle) => {
                self.publish(AlertUpdate::PlaybackStarted { clip: clip.to_string(), duration_ms: handle.duration_ms() });
                let updates = self.updates.clone();
                tokio::spawn(async move {
                    let outcome = handle.wait().await;
                    debug!(target: LOG_TARGET, "Prompt '{}' finished: {:?}", clip, outcome);
                    let _ = updates.send(AlertUpdate::PlaybackFinished { clip: clip.to_string(), outcome });
                });
            }
            Err(e) => {
                match &e {
                    PlaybackError::Busy => debug!(target: LOG_TARGET, "Prompt '{}' skipped: {}", clip, e),
                    _ => warn!(target: LOG_TARGET, "Prompt '{}' skipped: {}", clip, e),
                }
                self.publish(AlertUpdate::PlaybackRejected { clip: clip.to_string(), error: e });
            }
        }
    }

    /// Returns to idle with every channel off and the ticker stopped.
    pub fn shutdown(&self) {
        let from = {
            let mut state = self.lock();
            let from = state.mode;
            self.ticker.stop();
            for binding in &ALERT_BINDINGS {
                self.channels[binding.channel].set(false);
            }
            *state = AlertState { tick_generation: state.tick_generation + 1, ..AlertState::default() };
            from
        };
        if !from.is_idle() {
            self.publish(AlertUpdate::ModeChanged { from, to: AlertMode::Idle });
        }
        info!(target: LOG_TARGET, "Alert controller shut down");
    }
}
