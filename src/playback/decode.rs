//! Result-payload decoding for playback.
//!
//! Variants come back from the conversion service as WAV or MP3 bytes.
//! This module turns either into interleaved `f32` samples via symphonia,
//! leaving device concerns (rate, channel layout) to the sink.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as SymphoniaBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Errors produced while decoding a result payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container could not be probed, has no audio track, or broke
    /// mid-stream.
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// The stream decoded to zero samples.
    #[error("media decoded to zero samples")]
    EmptyStream,
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// A fully decoded clip, interleaved, still in the payload's own layout.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Frame count (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

// ---------------------------------------------------------------------------
// decode_media
// ---------------------------------------------------------------------------

/// Decode an in-memory media payload into interleaved `f32` samples.
///
/// `extension` is a probe hint (`"wav"`, `"mp3"`); decoding still works
/// without it.  Damaged packets are skipped with a logged warning so one
/// bad frame does not silence the rest of the clip.
///
/// # Errors
///
/// [`DecodeError::UnsupportedMedia`] when the bytes are not a decodable
/// container, [`DecodeError::EmptyStream`] when they decode to nothing.
pub fn decode_media(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedMedia(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedMedia("no audio track".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedMedia(e.to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|layout| layout.count())
        .unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // The reader signals end of stream as an IO error.
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => continue,
            Err(e) => return Err(DecodeError::UnsupportedMedia(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let mut buf = SymphoniaBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("playback: skipping damaged packet: {e}");
            }
            Err(e) => return Err(DecodeError::UnsupportedMedia(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(DecodeError::EmptyStream);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channels as u16,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
