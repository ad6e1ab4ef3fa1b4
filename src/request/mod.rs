//! Request sources: the two call buttons and the serial keystroke link.
//!
//! Each source runs as its own task and posts [`ControllerEvent::Request`]
//! messages onto the controller queue; the controller handles them one at a time.

mod button;
mod serial;

pub use button::{parse_gpio_level, ButtonEdgeDetector, ButtonPoller};
pub use serial::SerialReader;

use crate::alert::{AlertKind, ControllerEvent};
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const LOG_TARGET: &str = "carecall::request";

/// Where a request came from (diagnostics only; all origins behave the same).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    Button,
    Serial,
}

/// "Toggle this alert", from any source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestEvent {
    pub kind: AlertKind,
    pub origin: RequestOrigin,
}

impl RequestEvent {
    pub fn toggle(kind: AlertKind, origin: RequestOrigin) -> Self {
        RequestEvent { kind, origin }
    }
}

/// Meaning of one byte received on the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialInput {
    Request(AlertKind),
    /// Line terminators, dropped silently.
    Ignored,
    Unrecognised(u8),
}

/// Looks the byte up in the binding keys (`W`/`w` water, `T`/`t` washroom).
pub fn classify_serial_byte(byte: u8) -> SerialInput {
    match byte {
        b'\r' | b'\n' => SerialInput::Ignored,
        other => AlertKind::from_key(other).map_or(SerialInput::Unrecognised(other), SerialInput::Request),
    }
}

/// A task producing request events until shutdown or end of input.
#[async_trait]
pub trait RequestSource: Send {
    fn name(&self) -> String;

    async fn run(self: Box<Self>, events: mpsc::Sender<ControllerEvent>, shutdown_rx: broadcast::Receiver<()>);
}

/// Spawns `source` on the runtime.
pub fn spawn_source(
    source: Box<dyn RequestSource>,
    events: mpsc::Sender<ControllerEvent>,
    shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let name = source.name();
    info!(target: LOG_TARGET, "Starting request source: {}", name);
    tokio::spawn(async move {
        source.run(events, shutdown_rx).await;
        debug!(target: LOG_TARGET, "Request source {} finished", name);
    })
}
