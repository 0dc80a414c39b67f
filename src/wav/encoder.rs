//! Packs a recording into a 16-bit PCM WAV container.
//!
//! The conversion service accepts the classic RIFF/WAVE layout: a 44-byte
//! header (PCM format tag, channel count, sample rate, byte rate, block
//! align, 16 bits per sample) followed by interleaved little-endian frames.
//! Float samples are clamped to [-1, 1] and scaled asymmetrically — negative
//! values by 32768, non-negative by 32767 — truncating toward zero, so both
//! rails map onto the exact i16 extremes.  Encoding the same buffer twice
//! yields byte-identical output.

use std::io::Cursor;

use thiserror::Error;

use crate::audio::SampleBuffer;

// ---------------------------------------------------------------------------
// EncodeError
// ---------------------------------------------------------------------------

/// Container packing failure.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The underlying WAV writer rejected the stream.
    #[error("WAV write failed: {0}")]
    Write(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// EncodedWav
// ---------------------------------------------------------------------------

/// A finished WAV container plus the shape it was packed from.
#[derive(Debug, Clone)]
pub struct EncodedWav {
    bytes: Vec<u8>,
    sample_rate: u32,
    channels: u16,
}

impl EncodedWav {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total container size, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Size of the data chunk alone.
    pub fn data_size(&self) -> usize {
        self.bytes.len().saturating_sub(44)
    }
}

// ---------------------------------------------------------------------------
// Quantization
// ---------------------------------------------------------------------------

/// Maps one float sample onto i16 PCM.
///
/// Clamps to [-1, 1] first, then scales negative samples by 32768 and
/// non-negative ones by 32767, truncating toward zero.  The asymmetry means
/// -1.0 lands on -32768 and 1.0 on 32767 with no overflow on either rail.
pub fn quantize_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32_768.0) as i16
    } else {
        (s * 32_767.0) as i16
    }
}

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Packs `buffer` into an in-memory WAV container.
///
/// Frames are written frame-major (all channels of frame 0, then frame 1,
/// …), matching the interleaved layout players expect.
///
/// # Errors
///
/// Returns [`EncodeError::Write`] when the WAV writer fails; with an
/// in-memory target this does not happen in practice, but the writer's
/// result is propagated rather than swallowed.
pub fn encode(buffer: &SampleBuffer) -> Result<EncodedWav, EncodeError> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(buffer.encoded_wav_size());
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for frame in 0..buffer.frames() {
            for channel in 0..buffer.channel_count() as usize {
                writer.write_sample(quantize_sample(buffer.channel(channel)[frame]))?;
            }
        }
        // finalize patches the RIFF and data chunk sizes in the header.
        writer.finalize()?;
    }

    Ok(EncodedWav {
        bytes,
        sample_rate: buffer.sample_rate(),
        channels: buffer.channel_count(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
