use crate::audio::device::WordWidth;
use tracing::{trace, warn};

const LOG_TARGET: &str = "carecall::audio::sample_converter";

/// Converts raw little-endian PCM bytes into S16 samples, keeping the interleaving.
///
/// 8-bit input is unsigned (centred on 128); wider input keeps its top 16 bits.
/// A trailing partial sample is dropped.
pub fn to_s16_interleaved(payload: &[u8], width: WordWidth) -> Vec<i16> {
    let stride = width.bytes();
    let remainder = payload.len() % stride;
    if remainder != 0 {
        warn!(target: LOG_TARGET, "Payload has {} trailing bytes that do not form a full {:?} sample", remainder, width);
    }
    trace!(target: LOG_TARGET, "Converting {} bytes of {:?} PCM to S16", payload.len(), width);

    let samples = payload.chunks_exact(stride);
    match width {
        WordWidth::Bits8 => samples.map(|s| (s[0] as i16 - 128) * 256).collect(),
        WordWidth::Bits16 => samples.map(|s| i16::from_le_bytes([s[0], s[1]])).collect(),
        WordWidth::Bits24 => samples.map(|s| i16::from_le_bytes([s[1], s[2]])).collect(),
        WordWidth::Bits32 => samples.map(|s| i16::from_le_bytes([s[2], s[3]])).collect(),
    }
}
