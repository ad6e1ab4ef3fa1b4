//! Canonical 44-byte RIFF/WAVE header parsing.
//!
//! Only the minimal fixed layout is understood: `RIFF` tag, `WAVE` group tag,
//! a 16-byte `fmt ` chunk and the payload immediately after byte 44. Extra
//! chunks (`LIST`, `fact`, ...) are not scanned for.

use crate::audio::error::DecodeError;
use tracing::{debug, trace};

const LOG_TARGET: &str = "carecall::audio::container";

/// Size of the fixed header; the payload always starts here.
pub const HEADER_LEN: usize = 44;

const RIFF_TAG: (usize, &str) = (0, "RIFF");
const WAVE_TAG: (usize, &str) = (8, "WAVE");
const FMT_TAG: (usize, &str) = (12, "fmt ");

const CHANNELS_OFFSET: usize = 22;
const SAMPLE_RATE_OFFSET: usize = 24;
const BYTE_RATE_OFFSET: usize = 28;
const BITS_OFFSET: usize = 34;
const DATA_SIZE_OFFSET: usize = 40;

/// Fields extracted from a clip's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAudioHeader {
    pub sample_rate_hz: u32,
    pub byte_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
    pub payload_offset: usize,
    pub payload_size_bytes: usize,
}

impl DecodedAudioHeader {
    /// Payload duration in whole milliseconds (truncating). Zero if the byte rate is zero.
    pub fn duration_ms(&self) -> u64 {
        (self.payload_size_bytes as u64 * 1000)
            .checked_div(self.byte_rate as u64)
            .unwrap_or(0)
    }

    /// Byte range of the payload inside the original buffer.
    pub fn payload_range(&self) -> std::ops::Range<usize> {
        self.payload_offset..self.payload_offset + self.payload_size_bytes
    }
}

fn read_u16_le(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buffer[offset], buffer[offset + 1]])
}

fn read_u32_le(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buffer[offset], buffer[offset + 1], buffer[offset + 2], buffer[offset + 3]])
}

fn check_marker(buffer: &[u8], (offset, expected): (usize, &'static str)) -> Result<(), DecodeError> {
    if &buffer[offset..offset + 4] != expected.as_bytes() {
        debug!(target: LOG_TARGET, "Marker mismatch at offset {}: expected {:?}", offset, expected);
        return Err(DecodeError::BadMarker { offset, expected });
    }
    Ok(())
}

/// Validates the fixed header and extracts its fields.
pub fn decode(buffer: &[u8]) -> Result<DecodedAudioHeader, DecodeError> {
    if buffer.len() < HEADER_LEN {
        return Err(DecodeError::TooShort { len: buffer.len() });
    }

    check_marker(buffer, RIFF_TAG)?;
    check_marker(buffer, WAVE_TAG)?;
    check_marker(buffer, FMT_TAG)?;

    let channel_count = read_u16_le(buffer, CHANNELS_OFFSET);
    let sample_rate_hz = read_u32_le(buffer, SAMPLE_RATE_OFFSET);
    let byte_rate = read_u32_le(buffer, BYTE_RATE_OFFSET);
    let bits_per_sample = read_u16_le(buffer, BITS_OFFSET);
    let declared = read_u32_le(buffer, DATA_SIZE_OFFSET);

    if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
        return Err(DecodeError::UnsupportedBitDepth(bits_per_sample));
    }
    if !matches!(channel_count, 1 | 2) {
        return Err(DecodeError::UnsupportedChannelCount(channel_count));
    }

    let available = buffer.len() - HEADER_LEN;
    if declared as usize > available {
        return Err(DecodeError::PayloadOverrun { declared, available });
    }

    let header = DecodedAudioHeader {
        sample_rate_hz,
        byte_rate,
        bits_per_sample,
        channel_count,
        payload_offset: HEADER_LEN,
        payload_size_bytes: declared as usize,
    };
    trace!(target: LOG_TARGET, "Decoded header: {:?}", header);
    Ok(header)
}

/// Builds a canonical PCM header for a payload of `data_len` bytes.
pub fn encode_header(sample_rate_hz: u32, bits_per_sample: u16, channel_count: u16, data_len: u32) -> [u8; HEADER_LEN] {
    let block_align = channel_count * (bits_per_sample / 8);
    let byte_rate = sample_rate_hz * block_align as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channel_count.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate_hz.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}
