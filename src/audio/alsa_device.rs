use crate::audio::{
    alsa_handler::AlsaPcmHandler,
    device::{AudioOutputDevice, OutputConfig, TransferProgress},
    error::{AudioError, DeviceError},
    sample_converter,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info};

const LOG_TARGET: &str = "carecall::audio::alsa_device";

/// Frames handed to ALSA per write call.
const WRITE_FRAMES: usize = 1024;

#[derive(Debug, Default)]
struct TransferState {
    transferred: AtomicUsize,
    active: AtomicBool,
    failed: Mutex<Option<String>>,
}

impl TransferState {
    fn fail(&self, reason: String) {
        if let Ok(mut failed) = self.failed.lock() {
            *failed = Some(reason);
        }
    }
}

/// Streams payloads to an ALSA PCM from a dedicated writer thread.
pub struct AlsaOutputDevice {
    device_name: String,
    config: Mutex<Option<OutputConfig>>,
    state: Arc<TransferState>,
}

impl AlsaOutputDevice {
    pub fn new(device_name: &str) -> Self {
        info!(target: LOG_TARGET, "Using ALSA output device: {}", device_name);
        AlsaOutputDevice {
            device_name: device_name.to_string(),
            config: Mutex::new(None),
            state: Arc::new(TransferState::default()),
        }
    }
}

fn stream_payload(device_name: &str, config: OutputConfig, payload: &[u8], state: &TransferState) -> Result<(), AudioError> {
    let mut handler = AlsaPcmHandler::new(device_name);
    handler.initialize(config.sample_rate_hz, config.channel_mode.count())?;

    let samples = sample_converter::to_s16_interleaved(payload, config.word_width);
    let channels = handler.channels();
    let source_bytes_per_frame = config.word_width.bytes() * channels;

    let mut offset = 0;
    while offset < samples.len() {
        let end = (offset + WRITE_FRAMES * channels).min(samples.len());
        let frames = handler.write_s16_buffer(&samples[offset..end])?;
        offset += frames * channels;
        let consumed = (offset / channels) * source_bytes_per_frame;
        state.transferred.store(consumed.min(payload.len()), Ordering::Release);
    }
    handler.drain()?;
    state.transferred.store(payload.len(), Ordering::Release);
    Ok(())
}

impl AudioOutputDevice for AlsaOutputDevice {
    fn configure(&self, config: OutputConfig) -> Result<(), DeviceError> {
        if self.state.active.load(Ordering::Acquire) {
            return Err(DeviceError::Rejected("cannot reconfigure during a transfer".to_string()));
        }
        let mut current = self.config.lock().map_err(|_| DeviceError::Unavailable("config lock poisoned".to_string()))?;
        *current = Some(config);
        debug!(target: LOG_TARGET, "ALSA output configured: {:?}", config);
        Ok(())
    }

    fn submit(&self, payload: Bytes) -> Result<(), DeviceError> {
        let configured = *self.config.lock().map_err(|_| DeviceError::Unavailable("config lock poisoned".to_string()))?;
        let config = configured.ok_or_else(|| DeviceError::Rejected("device not configured".to_string()))?;
        if self.state.active.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::Rejected("transfer already running".to_string()));
        }
        self.state.transferred.store(0, Ordering::Release);
        if let Ok(mut failed) = self.state.failed.lock() {
            *failed = None;
        }

        let state = Arc::clone(&self.state);
        let device_name = self.device_name.clone();
        let spawned = thread::Builder::new().name("carecall-alsa-writer".to_string()).spawn(move || {
            if let Err(e) = stream_payload(&device_name, config, &payload, &state) {
                error!(target: LOG_TARGET, "ALSA transfer failed: {}", e);
                state.fail(e.to_string());
            }
            state.active.store(false, Ordering::Release);
        });

        if let Err(e) = spawned {
            self.state.active.store(false, Ordering::Release);
            return Err(DeviceError::Unavailable(e.to_string()));
        }
        Ok(())
    }

    fn progress(&self) -> TransferProgress {
        let failed = self.state.failed.lock().ok().and_then(|f| f.clone());
        TransferProgress { transferred: self.state.transferred.load(Ordering::Acquire), failed }
    }
}
