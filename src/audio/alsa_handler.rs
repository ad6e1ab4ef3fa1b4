use crate::audio::error::AudioError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "carecall::audio::alsa_handler";

/// Owns one ALSA PCM opened for interleaved S16 playback.
pub struct AlsaPcmHandler {
    device_name: String,
    pcm: Option<PCM>,
    channels: usize,
}

impl AlsaPcmHandler {
    pub fn new(device_name: &str) -> Self {
        debug!(target: LOG_TARGET, "Creating AlsaPcmHandler for device: {}", device_name);
        AlsaPcmHandler { device_name: device_name.to_string(), pcm: None, channels: 0 }
    }

    /// Opens the device for `rate` Hz, `channels` channel S16 output.
    #[instrument(skip(self), fields(device = %self.device_name))]
    pub fn initialize(&mut self, rate: u32, channels: usize) -> Result<(), AudioError> {
        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| AudioError::InitializationError(format!("Invalid device name: {}", e)))?;
        let pcm = PCM::open(&device, Direction::Playback, false)?;

        {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(channels as u32)?;
            hwp.set_rate_near(rate, ValueOr::Nearest)?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != rate {
                warn!(target: LOG_TARGET, "ALSA rate negotiation: requested={}, actual={}", rate, actual_rate);
            }
            pcm.hw_params(&hwp)?;

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(buffer_size - period_size)?;
            pcm.sw_params(&swp)?;
            debug!(target: LOG_TARGET, "ALSA parameters applied (buffer={}, period={}).", buffer_size, period_size);
        }

        self.pcm = Some(pcm);
        self.channels = channels;
        info!(target: LOG_TARGET, "ALSA device '{}' ready: {} Hz, {} channel(s)", self.device_name, rate, channels);
        Ok(())
    }

    /// Writes interleaved samples. Returns frames written; `Ok(0)` after a recovered underrun.
    pub fn write_s16_buffer(&self, buffer: &[i16]) -> Result<usize, AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| AudioError::InitializationError("PCM not initialized for writing".to_string()))?;
        let io = pcm.io_i16()?;

        match io.writei(buffer) {
            Ok(frames) => Ok(frames),
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun (EPIPE), recovering.");
                pcm.recover(libc::EPIPE, false)?;
                Ok(0)
            }
            Err(e) => {
                error!(target: LOG_TARGET, "ALSA write error: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Blocks until queued samples have been played.
    pub fn drain(&self) -> Result<(), AudioError> {
        if let Some(pcm) = &self.pcm {
            if matches!(pcm.state(), PcmState::Running | PcmState::Prepared) {
                pcm.drain()?;
            }
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            if matches!(pcm.state(), PcmState::Running | PcmState::Prepared) {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
    }
}

impl Drop for AlsaPcmHandler {
    fn drop(&mut self) {
        self.close();
    }
}
