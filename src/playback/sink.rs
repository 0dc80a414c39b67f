//! Output-device sink.
//!
//! A decoded clip is converted to the device's layout up front (channel
//! mapping, then linear-interpolation resampling), and a cpal output stream
//! walks the prepared buffer with a cursor.  Past the end the stream keeps
//! emitting silence and flags itself finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::playback::decode::DecodedAudio;

// ---------------------------------------------------------------------------
// SinkError
// ---------------------------------------------------------------------------

/// Errors that can occur opening or driving the output device.
#[derive(Debug, Error)]
pub enum SinkError {
    /// No output device is available on this host.
    #[error("no audio output device available")]
    NoOutputDevice,

    /// The default output config is not `f32`.
    #[error("output device does not support f32 playback")]
    UnsupportedOutput,

    /// The stream could not be built or started.
    #[error("output stream failed: {0}")]
    Stream(String),
}

impl From<cpal::DefaultStreamConfigError> for SinkError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        SinkError::Stream(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for SinkError {
    fn from(e: cpal::BuildStreamError) -> Self {
        SinkError::Stream(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for SinkError {
    fn from(e: cpal::PlayStreamError) -> Self {
        SinkError::Stream(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// AudioSink trait
// ---------------------------------------------------------------------------

/// Playback endpoint.  One clip at a time: [`begin`](AudioSink::begin)
/// replaces whatever is playing.
///
/// Implementations are not required to be `Send`; the sink lives on the
/// thread that drives playback (cpal streams are not `Send` on every
/// platform).
pub trait AudioSink {
    /// Start playing `audio` from the top, replacing any current clip.
    fn begin(&mut self, audio: DecodedAudio) -> Result<(), SinkError>;

    /// Stop the current clip, if any.
    fn silence(&mut self);

    /// True while a clip is still playing.
    fn is_active(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Layout conversion
// ---------------------------------------------------------------------------

/// Map interleaved audio from `from` channels to `to` channels.
///
/// * Same count — returned unchanged.
/// * Mono source — each sample replicated across all output channels.
/// * Anything else — frames are averaged down to mono first, then
///   replicated.
pub fn map_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if from == to {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let mut output = Vec::with_capacity(samples.len() / from * to);

    for frame in samples.chunks_exact(from) {
        let value = if from == 1 {
            frame[0]
        } else {
            frame.iter().sum::<f32>() / from as f32
        };
        for _ in 0..to {
            output.push(value);
        }
    }

    output
}

/// Resample interleaved frames from `source_rate` to `target_rate` Hz using
/// per-channel linear interpolation.  Rate match and empty input are no-op
/// fast paths.
pub fn resample_frames(
    samples: &[f32],
    channels: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() || channels == 0 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    let input_frames = samples.len() / channels;
    if input_frames == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_frames = (input_frames as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let src_pos = i as f64 / ratio;
        let idx0 = (src_pos as usize).min(input_frames - 1);
        let idx1 = (idx0 + 1).min(input_frames - 1);
        let frac = (src_pos - src_pos.floor()) as f32;

        for ch in 0..channels {
            let a = samples[idx0 * channels + ch];
            let b = samples[idx1 * channels + ch];
            output.push(a + (b - a) * frac);
        }
    }

    output
}

/// Convert a decoded clip to the device layout: channel-map first, then
/// resample.
pub fn prepare_for_device(audio: &DecodedAudio, device_rate: u32, device_channels: u16) -> Vec<f32> {
    let mapped = map_channels(&audio.samples, audio.channels, device_channels);
    resample_frames(&mapped, device_channels, audio.sample_rate, device_rate)
}

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

struct ActiveClip {
    // Dropping the stream stops the device callback.
    _stream: cpal::Stream,
    finished: Arc<AtomicBool>,
}

/// Plays prepared buffers through the default cpal output device.
pub struct CpalSink {
    device: cpal::Device,
    device_rate: u32,
    device_channels: u16,
    current: Option<ActiveClip>,
}

impl CpalSink {
    /// Open the default output device and read its format.
    ///
    /// # Errors
    ///
    /// [`SinkError::NoOutputDevice`] when the host has no output device,
    /// [`SinkError::UnsupportedOutput`] when its default config is not
    /// `f32`.
    pub fn open() -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SinkError::NoOutputDevice)?;

        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(SinkError::UnsupportedOutput);
        }

        Ok(Self {
            device_rate: config.sample_rate().0,
            device_channels: config.channels(),
            device,
            current: None,
        })
    }

    /// Negotiated device sample rate in Hz.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    /// Negotiated device channel count.
    pub fn device_channels(&self) -> u16 {
        self.device_channels
    }
}

impl AudioSink for CpalSink {
    fn begin(&mut self, audio: DecodedAudio) -> Result<(), SinkError> {
        self.silence();

        let prepared = prepare_for_device(&audio, self.device_rate, self.device_channels);
        let finished = Arc::new(AtomicBool::new(false));
        let finished_cb = finished.clone();
        let mut cursor = 0usize;

        let config = cpal::StreamConfig {
            channels: self.device_channels,
            sample_rate: cpal::SampleRate(self.device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Runs on the device's audio thread: copy the next slice of the
        // prepared buffer, zero-fill past the end.
        let stream = self.device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let take = (prepared.len() - cursor).min(data.len());
                data[..take].copy_from_slice(&prepared[cursor..cursor + take]);
                for sample in &mut data[take..] {
                    *sample = 0.0;
                }
                cursor += take;
                if cursor >= prepared.len() {
                    finished_cb.store(true, Ordering::Relaxed);
                }
            },
            |err| log::error!("playback stream error: {err}"),
            None,
        )?;

        stream.play()?;

        self.current = Some(ActiveClip {
            _stream: stream,
            finished,
        });
        Ok(())
    }

    fn silence(&mut self) {
        if let Some(clip) = self.current.take() {
            clip.finished.store(true, Ordering::Relaxed);
        }
    }

    fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|clip| !clip.finished.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- map_channels ------------------------------------------------------

    #[test]
    fn map_channels_same_count_is_noop() {
        let input = vec![0.1_f32, 0.2, 0.3, 0.4];
        assert_eq!(map_channels(&input, 2, 2), input);
    }

    #[test]
    fn map_channels_mono_replicates() {
        let out = map_channels(&[0.5_f32, -0.5], 1, 2);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn map_channels_stereo_to_mono_averages() {
        let out = map_channels(&[1.0_f32, 0.0, -1.0, -1.0], 2, 1);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn map_channels_quad_to_stereo_goes_through_mono() {
        // One frame of four channels averaging to 0.25, replicated twice.
        let out = map_channels(&[1.0_f32, 0.0, 0.0, 0.0], 4, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn map_channels_zero_is_empty() {
        assert!(map_channels(&[1.0_f32], 0, 2).is_empty());
        assert!(map_channels(&[1.0_f32], 1, 0).is_empty());
    }

    // ---- resample_frames ---------------------------------------------------

    #[test]
    fn resample_rate_match_is_noop() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample_frames(&input, 1, 44_100, 44_100), input);
    }

    #[test]
    fn resample_halves_frame_count() {
        // 480 mono frames @ 48 kHz = 10 ms → 240 frames @ 24 kHz.
        let input = vec![0.5_f32; 480];
        let out = resample_frames(&input, 1, 48_000, 24_000);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn resample_doubles_frame_count_interleaved() {
        // 100 stereo frames @ 22.05 kHz → 200 frames @ 44.1 kHz.
        let input = vec![0.25_f32; 200];
        let out = resample_frames(&input, 2, 22_050, 44_100);
        assert_eq!(out.len(), 400);
    }

    #[test]
    fn resample_constant_signal_preserves_amplitude() {
        let input = vec![0.5_f32; 480];
        let out = resample_frames(&input, 1, 48_000, 44_100);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_keeps_channels_independent() {
        // Left channel constant 1.0, right constant -1.0; interpolation
        // must never mix them.
        let mut input = Vec::new();
        for _ in 0..100 {
            input.push(1.0_f32);
            input.push(-1.0_f32);
        }
        let out = resample_frames(&input, 2, 48_000, 32_000);
        for frame in out.chunks_exact(2) {
            assert!((frame[0] - 1.0).abs() < 1e-6);
            assert!((frame[1] + 1.0).abs() < 1e-6);
        }
    }

    // ---- prepare_for_device ------------------------------------------------

    #[test]
    fn prepare_maps_then_resamples() {
        let audio = DecodedAudio {
            samples: vec![0.5_f32; 441],
            sample_rate: 44_100,
            channels: 1,
        };
        // Mono 44.1 kHz clip onto a stereo 22.05 kHz device: half the
        // frames, twice the channels.
        let out = prepare_for_device(&audio, 22_050, 2);
        assert_eq!(out.len() / 2, 221);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }
}
