use crate::alert::ALERT_BINDINGS;
use crate::audio::container::{self, HEADER_LEN};
use crate::audio::error::AudioError;
use crate::config::Settings;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOG_TARGET: &str = "carecall::audio::clips";

pub const WATER_CLIP: &str = "water";
pub const RESTROOM_CLIP: &str = "restroom";

const CHIME_RATE_HZ: u32 = 16_000;
const CHIME_DURATION_MS: u32 = 1200;
const FADE_MS: u32 = 40;

/// Immutable name -> container buffer table.
#[derive(Debug, Clone, Default)]
pub struct ClipTable {
    clips: HashMap<String, Bytes>,
}

impl ClipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; the table is frozen once it is handed to the orchestrator.
    pub fn with_clip(mut self, name: &str, data: impl Into<Bytes>) -> Self {
        self.clips.insert(name.to_string(), data.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.clips.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Loads the configured WAV files, falling back to synthesized chimes.
    ///
    /// Files are validated up front so a broken recording is reported at startup
    /// instead of on the first repeat tick.
    pub fn from_settings(settings: &Settings) -> Result<Self, AudioError> {
        let mut table = Self::new();
        for binding in &ALERT_BINDINGS {
            let path = settings.clips.get(binding.clip).map(PathBuf::as_path);
            let clip = load_or_chime(binding.clip, path, binding.chime_hz)?;
            table = table.with_clip(binding.clip, clip);
        }
        Ok(table)
    }
}

fn load_or_chime(name: &str, path: Option<&Path>, freq_hz: f32) -> Result<Bytes, AudioError> {
    match path {
        Some(path) => {
            let data = Bytes::from(fs::read(path)?);
            container::decode(&data).map_err(|source| AudioError::InvalidClip { name: name.to_string(), source })?;
            info!(target: LOG_TARGET, "Loaded clip '{}' from {} ({} bytes)", name, path.display(), data.len());
            Ok(data)
        }
        None => {
            warn!(target: LOG_TARGET, "No recording configured for '{}', using a {} Hz chime", name, freq_hz);
            Ok(synthesize_tone(freq_hz, CHIME_DURATION_MS, CHIME_RATE_HZ))
        }
    }
}

/// Renders a mono 16-bit sine chime wrapped in a canonical container.
pub fn synthesize_tone(freq_hz: f32, duration_ms: u32, sample_rate_hz: u32) -> Bytes {
    let frames = (sample_rate_hz as u64 * duration_ms as u64 / 1000) as usize;
    let fade_frames = ((sample_rate_hz * FADE_MS / 1000) as usize).min(frames / 2).max(1);
    let data_len = (frames * 2) as u32;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + frames * 2);
    buf.put_slice(&container::encode_header(sample_rate_hz, 16, 1, data_len));

    for i in 0..frames {
        let t = i as f32 / sample_rate_hz as f32;
        let envelope = if i < fade_frames {
            i as f32 / fade_frames as f32
        } else if frames - i <= fade_frames {
            (frames - i) as f32 / fade_frames as f32
        } else {
            1.0
        };
        let sample = (t * freq_hz * std::f32::consts::TAU).sin() * envelope * 0.5;
        buf.put_i16_le((sample * 32767.0).clamp(-32768.0, 32767.0) as i16);
    }
    buf.freeze()
}
