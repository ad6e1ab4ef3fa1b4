use std::error::Error;
use std::io;

/// Structural problems found while decoding a clip container.
///
/// Every variant belongs to the `InvalidFormat` class: the clip cannot be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    TooShort { len: usize },
    BadMarker { offset: usize, expected: &'static str },
    UnsupportedBitDepth(u16),
    UnsupportedChannelCount(u16),
    PayloadOverrun { declared: u32, available: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::TooShort { len } => write!(f, "buffer of {} bytes is shorter than the 44-byte header", len),
            DecodeError::BadMarker { offset, expected } => write!(f, "expected marker {:?} at offset {}", expected, offset),
            DecodeError::UnsupportedBitDepth(bits) => write!(f, "unsupported bits per sample: {}", bits),
            DecodeError::UnsupportedChannelCount(ch) => write!(f, "unsupported channel count: {}", ch),
            DecodeError::PayloadOverrun { declared, available } => {
                write!(f, "declared payload of {} bytes exceeds the {} bytes available", declared, available)
            }
        }
    }
}

impl Error for DecodeError {}

/// Errors reported by an audio output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    Rejected(String),
    Unavailable(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Rejected(s) => write!(f, "device rejected request: {}", s),
            DeviceError::Unavailable(s) => write!(f, "device unavailable: {}", s),
        }
    }
}

impl Error for DeviceError {}

/// Why a playback request did not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    InvalidFormat(DecodeError),
    UnknownClip(String),
    Busy,
    TransferStartFailed(DeviceError),
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            PlaybackError::UnknownClip(name) => write!(f, "Unknown clip: {}", name),
            PlaybackError::Busy => write!(f, "Playback already in progress"),
            PlaybackError::TransferStartFailed(e) => write!(f, "Transfer start failed: {}", e),
        }
    }
}

impl Error for PlaybackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PlaybackError::InvalidFormat(e) => Some(e),
            PlaybackError::TransferStartFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for PlaybackError {
    fn from(e: DecodeError) -> Self {
        PlaybackError::InvalidFormat(e)
    }
}

impl From<DeviceError> for PlaybackError {
    fn from(e: DeviceError) -> Self {
        PlaybackError::TransferStartFailed(e)
    }
}

/// Errors raised while setting up the audio side (clip loading, backend selection).
#[derive(Debug)]
pub enum AudioError {
    IoError(io::Error),
    InvalidClip { name: String, source: DecodeError },
    #[cfg(feature = "alsa")]
    AlsaError(String),
    InitializationError(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::IoError(e) => write!(f, "I/O error: {}", e),
            AudioError::InvalidClip { name, source } => write!(f, "Invalid clip '{}': {}", name, source),
            #[cfg(feature = "alsa")]
            AudioError::AlsaError(e) => write!(f, "ALSA error: {}", e),
            AudioError::InitializationError(e) => write!(f, "Initialization error: {}", e),
        }
    }
}

impl Error for AudioError {}

impl From<io::Error> for AudioError {
    fn from(e: io::Error) -> Self {
        AudioError::IoError(e)
    }
}

#[cfg(feature = "alsa")]
impl From<alsa::Error> for AudioError {
    fn from(e: alsa::Error) -> Self {
        AudioError::AlsaError(e.to_string())
    }
}
