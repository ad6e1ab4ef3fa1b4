use crate::audio::{PlaybackError, PlaybackOutcome};
use crate::audio::clips::{RESTROOM_CLIP, WATER_CLIP};
use crate::request::RequestEvent;

/// Number of alert kinds (and therefore indicator channels).
pub const ALERT_KIND_COUNT: usize = 2;

/// A need the patient can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Water,
    Washroom,
}

/// Everything an alert kind is wired to: request keys, indicator channel and spoken clip.
#[derive(Debug)]
pub struct AlertBinding {
    pub kind: AlertKind,
    /// Key for LED/button settings and log output.
    pub label: &'static str,
    /// Serial bytes that request this alert; the first is shown in the banner.
    pub keys: &'static [u8],
    /// Index into the controller's channel array.
    pub channel: usize,
    pub clip: &'static str,
    /// Pitch of the built-in chime used when no recording is configured.
    pub chime_hz: f32,
}

/// One row per kind, in enum and channel order.
pub static ALERT_BINDINGS: [AlertBinding; ALERT_KIND_COUNT] = [
    AlertBinding { kind: AlertKind::Water, label: "water", keys: b"Ww", channel: 0, clip: WATER_CLIP, chime_hz: 880.0 },
    AlertBinding {
        kind: AlertKind::Washroom,
        label: "washroom",
        keys: b"Tt",
        channel: 1,
        clip: RESTROOM_CLIP,
        chime_hz: 660.0,
    },
];

impl AlertKind {
    pub const ALL: [AlertKind; ALERT_KIND_COUNT] = [AlertKind::Water, AlertKind::Washroom];

    pub fn binding(self) -> &'static AlertBinding {
        &ALERT_BINDINGS[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.binding().label
    }

    /// The alert a serial byte requests, if any.
    pub fn from_key(byte: u8) -> Option<AlertKind> {
        ALERT_BINDINGS.iter().find(|b| b.keys.contains(&byte)).map(|b| b.kind)
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertMode {
    #[default]
    Idle,
    Alert(AlertKind),
}

impl AlertMode {
    pub fn active_kind(self) -> Option<AlertKind> {
        match self {
            AlertMode::Idle => None,
            AlertMode::Alert(kind) => Some(kind),
        }
    }

    pub fn is_idle(self) -> bool {
        self == AlertMode::Idle
    }
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSnapshot {
    pub mode: AlertMode,
    pub blink_on: bool,
    pub repeat_counter: u32,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// New level of the active channel; `None` when idle.
    pub blink: Option<bool>,
    /// Clip whose playback this tick requested.
    pub playback: Option<&'static str>,
}

/// Messages consumed by the controller loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Request(RequestEvent),
    /// Heartbeat tagged with the generation of the ticker run that produced it.
    Tick(u64),
    Shutdown,
}

/// Diagnostic updates broadcast by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertUpdate {
    ModeChanged { from: AlertMode, to: AlertMode },
    PlaybackStarted { clip: String, duration_ms: u64 },
    PlaybackFinished { clip: String, outcome: PlaybackOutcome },
    PlaybackRejected { clip: String, error: PlaybackError },
}
