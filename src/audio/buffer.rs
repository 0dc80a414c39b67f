//! In-memory PCM recording buffer.
//!
//! A [`SampleBuffer`] holds one finished recording as planar `f32` channels
//! at a fixed sample rate.  Shape is validated at construction and never
//! changes afterwards, so every consumer (encoder, slicer, playback) can
//! assume equal-length, non-empty channels.
//!
//! # Example
//!
//! ```rust
//! use audio_digitizer::audio::SampleBuffer;
//!
//! let buf = SampleBuffer::from_interleaved(44_100, 2, &[0.1, -0.1, 0.2, -0.2]).unwrap();
//! assert_eq!(buf.frames(), 2);
//! assert_eq!(buf.channel(0), &[0.1, 0.2]);
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Shape violations rejected by [`SampleBuffer`] construction and slicing.
#[derive(Debug, Error, PartialEq)]
pub enum BufferError {
    /// Zero channels.
    #[error("buffer has no channels")]
    NoChannels,

    /// Channels exist but hold no frames.
    #[error("buffer has no frames")]
    Empty,

    /// Planar channels of unequal length.
    #[error("channel {channel} has {got} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        got: usize,
        expected: usize,
    },

    /// Interleaved data that does not divide into whole frames.
    #[error("{samples} interleaved samples do not divide into {channels} channels")]
    PartialFrame { samples: usize, channels: u16 },

    /// A sample rate of zero makes durations meaningless.
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    /// A time range that selects no frames.
    #[error("range {start_secs}s..{end_secs}s selects no frames")]
    EmptyRange { start_secs: f64, end_secs: f64 },
}

// ---------------------------------------------------------------------------
// TimeRange
// ---------------------------------------------------------------------------

/// Half-open selection of a recording in seconds, used to submit only a cut
/// of the capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// A finished recording: planar `f32` samples, nominally in [-1, 1], one
/// `Vec` per channel, all channels the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Build a buffer from planar channel data, validating its shape.
    ///
    /// # Errors
    ///
    /// [`BufferError::ZeroSampleRate`], [`BufferError::NoChannels`],
    /// [`BufferError::Empty`] or [`BufferError::ChannelLengthMismatch`]
    /// when the data does not form a rectangular, non-empty recording.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        if channels.is_empty() {
            return Err(BufferError::NoChannels);
        }
        let expected = channels[0].len();
        if expected == 0 {
            return Err(BufferError::Empty);
        }
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(BufferError::ChannelLengthMismatch {
                    channel,
                    got: data.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build a buffer from interleaved frame-major samples, as delivered by
    /// capture callbacks.
    ///
    /// # Errors
    ///
    /// [`BufferError::PartialFrame`] when `samples` is not a whole number of
    /// frames, plus the shape errors of [`SampleBuffer::new`].
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: u16,
        samples: &[f32],
    ) -> Result<Self, BufferError> {
        if channel_count == 0 {
            return Err(BufferError::NoChannels);
        }
        let stride = channel_count as usize;
        if samples.len() % stride != 0 {
            return Err(BufferError::PartialFrame {
                samples: samples.len(),
                channels: channel_count,
            });
        }
        let frames = samples.len() / stride;
        let mut channels = vec![Vec::with_capacity(frames); stride];
        for frame in samples.chunks_exact(stride) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Planar samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range; channel counts are fixed at
    /// construction.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Recording length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples re-interleaved frame-major, for sinks that consume frames.
    pub fn interleaved(&self) -> Vec<f32> {
        let stride = self.channels.len();
        let mut out = Vec::with_capacity(self.frames() * stride);
        for frame in 0..self.frames() {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }

    /// Size in bytes of this recording once packed into a 16-bit PCM WAV
    /// container (44-byte header plus two bytes per sample).
    pub fn encoded_wav_size(&self) -> usize {
        44 + self.frames() * self.channels.len() * 2
    }

    /// Cut the selected range out of the recording.
    ///
    /// Boundaries are converted with `floor(time × sample_rate)` and clamped
    /// to the recording; no resampling happens.  The cut keeps every channel.
    ///
    /// # Errors
    ///
    /// [`BufferError::EmptyRange`] when the clamped range contains no frames.
    pub fn slice_seconds(&self, range: TimeRange) -> Result<Self, BufferError> {
        let rate = self.sample_rate as f64;
        let start = (range.start_secs.max(0.0) * rate).floor() as usize;
        let end = ((range.end_secs.max(0.0) * rate).floor() as usize).min(self.frames());
        if start >= end {
            return Err(BufferError::EmptyRange {
                start_secs: range.start_secs,
                end_secs: range.end_secs,
            });
        }
        let channels = self
            .channels
            .iter()
            .map(|data| data[start..end].to_vec())
            .collect();
        Self::new(self.sample_rate, channels)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
