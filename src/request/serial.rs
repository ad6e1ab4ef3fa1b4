use super::{classify_serial_byte, RequestEvent, RequestOrigin, RequestSource, SerialInput};
use crate::alert::ControllerEvent;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "carecall::request::serial";

/// ETX, what Ctrl+C produces on a raw-mode terminal.
const CTRL_C: u8 = 0x03;

/// Turns bytes from a serial link (or a raw-mode terminal) into toggle requests.
pub struct SerialReader<R> {
    name: String,
    reader: R,
    terminal_interrupt: bool,
}

impl<R: AsyncRead + Unpin + Send> SerialReader<R> {
    pub fn new(name: &str, reader: R) -> Self {
        SerialReader { name: name.to_string(), reader, terminal_interrupt: false }
    }

    /// Treat Ctrl+C as a shutdown request. Raw mode stops the terminal from raising SIGINT.
    pub fn with_terminal_interrupt(mut self, enabled: bool) -> Self {
        self.terminal_interrupt = enabled;
        self
    }
}

/// Handles one byte. Returns false once the reader should stop.
async fn forward_byte(name: &str, terminal_interrupt: bool, byte: u8, events: &mpsc::Sender<ControllerEvent>) -> bool {
    if terminal_interrupt && byte == CTRL_C {
        info!(target: LOG_TARGET, "Ctrl+C received on {}, requesting shutdown", name);
        let _ = events.send(ControllerEvent::Shutdown).await;
        return false;
    }

    match classify_serial_byte(byte) {
        SerialInput::Request(kind) => {
            info!(target: LOG_TARGET, "'{}' received - {} request", byte as char, kind);
            let request = RequestEvent::toggle(kind, RequestOrigin::Serial);
            events.send(ControllerEvent::Request(request)).await.is_ok()
        }
        SerialInput::Ignored => true,
        SerialInput::Unrecognised(other) => {
            info!(target: LOG_TARGET, "Received {:?} (0x{:02X}) - ignored", other as char, other);
            true
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RequestSource for SerialReader<R> {
    fn name(&self) -> String {
        format!("serial:{}", self.name)
    }

    async fn run(self: Box<Self>, events: mpsc::Sender<ControllerEvent>, mut shutdown_rx: broadcast::Receiver<()>) {
        let SerialReader { name, mut reader, terminal_interrupt } = *self;
        let mut buf = [0u8; 64];
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(target: LOG_TARGET, "Shutdown signal received, closing {}", name);
                    return;
                }
                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(0) => {
                            info!(target: LOG_TARGET, "End of input on {}", name);
                            return;
                        }
                        Ok(n) => n,
                        Err(e) => {
                            warn!(target: LOG_TARGET, "Read error on {}: {}", name, e);
                            return;
                        }
                    };
                    for &byte in &buf[..n] {
                        if !forward_byte(&name, terminal_interrupt, byte, &events).await {
                            return;
                        }
                    }
                }
            }
        }
    }
}
