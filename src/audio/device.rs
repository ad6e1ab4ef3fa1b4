//! Audio output device seam.
//!
//! A device is configured for a sample format and then handed a payload to
//! stream asynchronously. Submission returns as soon as the transfer is
//! running; completion is observed by polling [`AudioOutputDevice::progress`].

use crate::audio::container::DecodedAudioHeader;
use crate::audio::error::{DecodeError, DeviceError};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "carecall::audio::device";

/// Width of one sample word on the output transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordWidth {
    Bits8,
    Bits16,
    Bits24,
    Bits32,
}

impl WordWidth {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(WordWidth::Bits8),
            16 => Some(WordWidth::Bits16),
            24 => Some(WordWidth::Bits24),
            32 => Some(WordWidth::Bits32),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            WordWidth::Bits8 => 1,
            WordWidth::Bits16 => 2,
            WordWidth::Bits24 => 3,
            WordWidth::Bits32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Single channel, routed to the left slot.
    Mono,
    Stereo,
}

impl ChannelMode {
    pub fn from_count(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(ChannelMode::Mono),
            2 => Some(ChannelMode::Stereo),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            ChannelMode::Mono => 1,
            ChannelMode::Stereo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub word_width: WordWidth,
    pub channel_mode: ChannelMode,
    pub sample_rate_hz: u32,
}

impl OutputConfig {
    pub fn from_header(header: &DecodedAudioHeader) -> Result<Self, DecodeError> {
        let word_width = WordWidth::from_bits(header.bits_per_sample)
            .ok_or(DecodeError::UnsupportedBitDepth(header.bits_per_sample))?;
        let channel_mode = ChannelMode::from_count(header.channel_count)
            .ok_or(DecodeError::UnsupportedChannelCount(header.channel_count))?;
        Ok(OutputConfig { word_width, channel_mode, sample_rate_hz: header.sample_rate_hz })
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate_hz as usize * self.word_width.bytes() * self.channel_mode.count()
    }
}

/// Snapshot of the in-flight (or last) transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred: usize,
    pub failed: Option<String>,
}

pub trait AudioOutputDevice: Send + Sync {
    /// Applies the word width and channel mode for the next transfer.
    fn configure(&self, config: OutputConfig) -> Result<(), DeviceError>;

    /// Starts streaming `payload`; must not block for the transfer's duration.
    fn submit(&self, payload: Bytes) -> Result<(), DeviceError>;

    /// Bytes of the current payload consumed so far, or a failure reason.
    fn progress(&self) -> TransferProgress;
}

// --- Mock device ---

#[derive(Debug, Default)]
struct MockState {
    configs: Vec<OutputConfig>,
    submissions: Vec<Bytes>,
    transferred: usize,
    failed: Option<String>,
    reject_with: Option<String>,
}

/// Device whose transfer progress is driven by the caller.
#[derive(Debug, Default)]
pub struct MockOutputDevice {
    state: Mutex<MockState>,
}

impl MockOutputDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every following `submit` fail with `reason`.
    pub fn reject_submissions(&self, reason: &str) {
        self.lock().reject_with = Some(reason.to_string());
    }

    pub fn advance(&self, bytes: usize) {
        let mut state = self.lock();
        let total = state.submissions.last().map_or(0, Bytes::len);
        state.transferred = (state.transferred + bytes).min(total);
    }

    /// Marks the current payload as fully transferred.
    pub fn complete(&self) {
        let mut state = self.lock();
        state.transferred = state.submissions.last().map_or(0, Bytes::len);
    }

    pub fn fail_transfer(&self, reason: &str) {
        self.lock().failed = Some(reason.to_string());
    }

    pub fn submit_count(&self) -> usize {
        self.lock().submissions.len()
    }

    pub fn submissions(&self) -> Vec<Bytes> {
        self.lock().submissions.clone()
    }

    pub fn configs(&self) -> Vec<OutputConfig> {
        self.lock().configs.clone()
    }
}

impl AudioOutputDevice for MockOutputDevice {
    fn configure(&self, config: OutputConfig) -> Result<(), DeviceError> {
        self.lock().configs.push(config);
        Ok(())
    }

    fn submit(&self, payload: Bytes) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if let Some(reason) = &state.reject_with {
            return Err(DeviceError::Rejected(reason.clone()));
        }
        state.submissions.push(payload);
        state.transferred = 0;
        state.failed = None;
        Ok(())
    }

    fn progress(&self) -> TransferProgress {
        let state = self.lock();
        TransferProgress { transferred: state.transferred, failed: state.failed.clone() }
    }
}

// --- Paced null sink ---

const PACE_STEP: StdDuration = StdDuration::from_millis(10);

#[derive(Debug, Default)]
struct PacedShared {
    transferred: AtomicUsize,
    bytes_per_second: AtomicUsize,
    active: AtomicBool,
}

/// Discards samples at the rate real hardware would consume them.
///
/// Lets the full alert loop run on machines without a sound card.
#[derive(Debug, Default)]
pub struct PacedOutputDevice {
    shared: Arc<PacedShared>,
}

impl PacedOutputDevice {
    pub fn new() -> Self {
        info!(target: LOG_TARGET, "Using paced null audio sink.");
        Self::default()
    }
}

impl AudioOutputDevice for PacedOutputDevice {
    fn configure(&self, config: OutputConfig) -> Result<(), DeviceError> {
        if self.shared.active.load(Ordering::Acquire) {
            return Err(DeviceError::Rejected("cannot reconfigure during a transfer".to_string()));
        }
        debug!(target: LOG_TARGET, "Null sink configured: {:?}", config);
        self.shared.bytes_per_second.store(config.bytes_per_second(), Ordering::Release);
        Ok(())
    }

    fn submit(&self, payload: Bytes) -> Result<(), DeviceError> {
        let rate = self.shared.bytes_per_second.load(Ordering::Acquire);
        if rate == 0 {
            return Err(DeviceError::Rejected("device not configured".to_string()));
        }
        if self.shared.active.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::Rejected("transfer already running".to_string()));
        }
        self.shared.transferred.store(0, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let total = payload.len();
        let step = (rate * PACE_STEP.as_millis() as usize / 1000).max(1);
        let spawned = thread::Builder::new().name("carecall-null-sink".to_string()).spawn(move || {
            let mut done = 0;
            while done < total {
                thread::sleep(PACE_STEP);
                done = (done + step).min(total);
                shared.transferred.store(done, Ordering::Release);
            }
            shared.active.store(false, Ordering::Release);
        });

        if let Err(e) = spawned {
            warn!(target: LOG_TARGET, "Failed to spawn null sink thread: {}", e);
            self.shared.active.store(false, Ordering::Release);
            return Err(DeviceError::Unavailable(e.to_string()));
        }
        Ok(())
    }

    fn progress(&self) -> TransferProgress {
        TransferProgress { transferred: self.shared.transferred.load(Ordering::Acquire), failed: None }
    }
}
