//! Spoken-prompt playback: clip container decoding, output devices and the
//! one-at-a-time playback orchestrator.

#[cfg(feature = "alsa")]
mod alsa_device;
#[cfg(feature = "alsa")]
mod alsa_handler;
pub mod clips;
pub mod container;
pub mod device;
mod error;
mod playback;
pub mod sample_converter;

#[cfg(feature = "alsa")]
pub use alsa_device::AlsaOutputDevice;
pub use clips::ClipTable;
pub use container::{decode, DecodedAudioHeader};
pub use device::{AudioOutputDevice, ChannelMode, MockOutputDevice, OutputConfig, PacedOutputDevice, TransferProgress, WordWidth};
pub use error::{AudioError, DecodeError, DeviceError, PlaybackError};
pub use playback::{PlaybackHandle, PlaybackOrchestrator, PlaybackOutcome, DEFAULT_POLL_INTERVAL, DEFAULT_STALL_GRACE};

use crate::config::{OutputBackend, Settings};
use std::sync::Arc;

/// Opens the output device selected in `settings`.
pub fn open_output_device(settings: &Settings) -> Result<Arc<dyn AudioOutputDevice>, AudioError> {
    match settings.output_backend {
        OutputBackend::Null => Ok(Arc::new(PacedOutputDevice::new())),
        #[cfg(feature = "alsa")]
        OutputBackend::Alsa => Ok(Arc::new(AlsaOutputDevice::new(&settings.alsa_device))),
        #[cfg(not(feature = "alsa"))]
        OutputBackend::Alsa => Err(AudioError::InitializationError(
            "ALSA output requested but carecall was built without the `alsa` feature".to_string(),
        )),
    }
}
