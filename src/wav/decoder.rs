//! Reads 16-bit PCM WAV containers back into sample buffers.
//!
//! Mirrors the encoder's asymmetric scaling on the way out (negative samples
//! divide by 32768, non-negative by 32767) so a pack/unpack pair recovers
//! the clamped input up to quantization error.

use std::io::Cursor;

use thiserror::Error;

use crate::audio::{BufferError, SampleBuffer};

// ---------------------------------------------------------------------------
// WavDecodeError
// ---------------------------------------------------------------------------

/// Container unpacking failure.
#[derive(Debug, Error)]
pub enum WavDecodeError {
    /// The bytes are not a readable WAV stream.
    #[error("WAV read failed: {0}")]
    Read(#[from] hound::Error),

    /// A readable stream in a layout this crate does not produce.
    #[error("unsupported WAV layout: {bits} bits per sample")]
    UnsupportedLayout { bits: u16 },

    /// The stream decoded to an invalid recording shape.
    #[error(transparent)]
    Shape(#[from] BufferError),
}

/// Maps one i16 PCM sample back onto a float.
pub fn dequantize_sample(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32_768.0
    } else {
        sample as f32 / 32_767.0
    }
}

/// Unpacks a 16-bit PCM WAV container.
///
/// # Errors
///
/// [`WavDecodeError::Read`] for malformed streams,
/// [`WavDecodeError::UnsupportedLayout`] for bit depths other than 16 and
/// [`WavDecodeError::Shape`] when the payload holds no frames.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, WavDecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(WavDecodeError::UnsupportedLayout {
            bits: spec.bits_per_sample,
        });
    }

    let mut interleaved = Vec::with_capacity(reader.len() as usize);
    for sample in reader.samples::<i16>() {
        interleaved.push(dequantize_sample(sample?));
    }

    Ok(SampleBuffer::from_interleaved(
        spec.sample_rate,
        spec.channels,
        &interleaved,
    )?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{encode, quantize_sample};

    #[test]
    fn dequantize_inverts_rails() {
        assert_eq!(dequantize_sample(32_767), 1.0);
        assert_eq!(dequantize_sample(-32_768), -1.0);
        assert_eq!(dequantize_sample(0), 0.0);
    }

    #[test]
    fn dequantize_inverts_quantize_on_exact_steps() {
        for sample in [-32_768, -16_384, -1, 0, 1, 16_383, 32_767_i16] {
            assert_eq!(quantize_sample(dequantize_sample(sample)), sample);
        }
    }

    #[test]
    fn round_trip_preserves_shape_and_samples() {
        let original = SampleBuffer::from_interleaved(
            44_100,
            2,
            &[0.1, -0.1, 0.5, -0.5, 0.9, -0.9, 1.0, -1.0],
        )
        .unwrap();

        let decoded = decode(encode(&original).unwrap().bytes()).unwrap();

        assert_eq!(decoded.sample_rate(), 44_100);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frames(), 4);
        for channel in 0..2 {
            for (got, want) in decoded
                .channel(channel)
                .iter()
                .zip(original.channel(channel))
            {
                assert!(
                    (got - want).abs() <= 1.0 / 32_767.0,
                    "sample drifted: {got} vs {want}"
                );
            }
        }
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(matches!(
            decode(b"definitely not a wav file"),
            Err(WavDecodeError::Read(_))
        ));
    }

    #[test]
    fn truncated_header_rejected() {
        let buffer = SampleBuffer::new(8_000, vec![vec![0.1; 16]]).unwrap();
        let wav = encode(&buffer).unwrap();
        assert!(decode(&wav.bytes()[..20]).is_err());
    }
}
