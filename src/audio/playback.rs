// src/audio/playback.rs
use crate::audio::{
    clips::ClipTable,
    container,
    device::{AudioOutputDevice, OutputConfig},
    error::{DeviceError, PlaybackError},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

const LOG_TARGET: &str = "carecall::audio::playback";

pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_millis(5);
pub const DEFAULT_STALL_GRACE: StdDuration = StdDuration::from_millis(2000);

/// How a started transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Complete,
    /// The device reported an error mid-transfer.
    Failed(String),
    /// No completion within the clip duration plus the grace period.
    Stalled,
}

/// Returned by [`PlaybackOrchestrator::start`]; resolves when the transfer ends.
#[derive(Debug)]
pub struct PlaybackHandle {
    clip: String,
    duration_ms: u64,
    completion: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    pub fn clip(&self) -> &str {
        &self.clip
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub async fn wait(self) -> PlaybackOutcome {
        self.completion
            .await
            .unwrap_or_else(|_| PlaybackOutcome::Failed("completion watcher dropped".to_string()))
    }
}

/// One-at-a-time clip streaming policy on top of an [`AudioOutputDevice`].
pub struct PlaybackOrchestrator {
    clips: ClipTable,
    device: Arc<dyn AudioOutputDevice>,
    busy: Arc<AtomicBool>,
    poll_interval: StdDuration,
    stall_grace: StdDuration,
}

impl PlaybackOrchestrator {
    pub fn new(clips: ClipTable, device: Arc<dyn AudioOutputDevice>) -> Self {
        info!(target: LOG_TARGET, "Creating playback orchestrator with {} clips", clips.len());
        PlaybackOrchestrator {
            clips,
            device,
            busy: Arc::new(AtomicBool::new(false)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stall_grace: DEFAULT_STALL_GRACE,
        }
    }

    pub fn with_timing(mut self, poll_interval: StdDuration, stall_grace: StdDuration) -> Self {
        self.poll_interval = poll_interval;
        self.stall_grace = stall_grace;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Looks up, decodes and submits `clip_name`, returning once the device is streaming.
    ///
    /// Must be called from inside a tokio runtime: completion is watched by a spawned task.
    #[instrument(skip(self), fields(clip = clip_name))]
    pub fn start(&self, clip_name: &str) -> Result<PlaybackHandle, PlaybackError> {
        let clip = self
            .clips
            .get(clip_name)
            .cloned()
            .ok_or_else(|| PlaybackError::UnknownClip(clip_name.to_string()))?;

        if self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            debug!(target: LOG_TARGET, "Playback of '{}' rejected: transfer in flight", clip_name);
            return Err(PlaybackError::Busy);
        }

        match self.submit(clip_name, &clip) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Starts `clip_name` and waits for the transfer to finish.
    pub async fn play(&self, clip_name: &str) -> Result<PlaybackOutcome, PlaybackError> {
        let handle = self.start(clip_name)?;
        Ok(handle.wait().await)
    }

    // Runs with the busy flag held; the caller releases it on error.
    fn submit(&self, clip_name: &str, clip: &bytes::Bytes) -> Result<PlaybackHandle, PlaybackError> {
        let header = container::decode(clip)?;
        let config = OutputConfig::from_header(&header)?;
        let duration_ms = header.duration_ms();
        info!(
            target: LOG_TARGET,
            "Playing '{}': {}-bit, {} channel(s), {} Hz, {} ms ({} bytes)",
            clip_name, header.bits_per_sample, header.channel_count, header.sample_rate_hz, duration_ms, header.payload_size_bytes
        );

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeviceError::Unavailable(format!("no async runtime for completion watcher: {}", e)))?;

        self.device.configure(config)?;
        let payload = clip.slice(header.payload_range());
        let total = payload.len();
        self.device.submit(payload)?;
        debug!(target: LOG_TARGET, "Transfer of '{}' started", clip_name);

        // The device paces by its configured format, not the header's byte-rate field.
        let paced_ms = (total as u64 * 1000).checked_div(config.bytes_per_second() as u64).unwrap_or(0);
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + StdDuration::from_millis(duration_ms.max(paced_ms)) + self.stall_grace;
        runtime.spawn(watch_transfer(
            Arc::clone(&self.device),
            Arc::clone(&self.busy),
            total,
            deadline,
            self.poll_interval,
            tx,
        ));

        Ok(PlaybackHandle { clip: clip_name.to_string(), duration_ms, completion: rx })
    }
}

async fn watch_transfer(
    device: Arc<dyn AudioOutputDevice>,
    busy: Arc<AtomicBool>,
    total: usize,
    deadline: Instant,
    poll_interval: StdDuration,
    done: oneshot::Sender<PlaybackOutcome>,
) {
    let outcome = loop {
        let progress = device.progress();
        if let Some(reason) = progress.failed {
            warn!(target: LOG_TARGET, "Transfer failed after {} of {} bytes: {}", progress.transferred, total, reason);
            break PlaybackOutcome::Failed(reason);
        }
        if progress.transferred >= total {
            break PlaybackOutcome::Complete;
        }
        if Instant::now() >= deadline {
            warn!(target: LOG_TARGET, "Transfer stalled at {} of {} bytes, giving up", progress.transferred, total);
            break PlaybackOutcome::Stalled;
        }
        trace!(target: LOG_TARGET, "Transferred {}/{} bytes", progress.transferred, total);
        tokio::time::sleep(poll_interval).await;
    };

    busy.store(false, Ordering::Release);
    debug!(target: LOG_TARGET, "Transfer finished: {:?}", outcome);
    // Nobody waiting is normal for tick-triggered playback.
    let _ = done.send(outcome);
}
