//! Microphone capture via `cpal`.
//!
//! [`MicrophoneCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`MicrophoneCapture::start`] to begin streaming [`CaptureChunk`]s over an
//! mpsc channel.  The returned [`StreamHandle`] is a RAII guard — dropping
//! it stops the underlying cpal stream.
//!
//! The device is asked for mono 44.1 kHz `f32` (or whatever the capture
//! settings prefer) and falls back to its own default shape when it cannot
//! provide that; the rate and channel count actually in effect are recorded
//! on the wrapper and on every chunk.  Chunks carry the converter output
//! untouched: no echo cancellation, noise suppression or gain control runs
//! anywhere in this crate.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

use crate::config::CaptureConfig;

// ---------------------------------------------------------------------------
// CaptureChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct CaptureChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value calls `cpal::Stream::drop` which pauses/stops the
/// underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running audio capture.
///
/// Platform errors are folded into this taxonomy so every failure mode gets
/// its own user-facing message:
///
/// | cpal condition                                | Variant              |
/// |-----------------------------------------------|----------------------|
/// | no input device, device gone at config time   | `NoInputDevice`      |
/// | rejected stream shape, non-f32-only device    | `UnsupportedEncoding`|
/// | device gone at build/play time                | `DeviceBusy`         |
/// | backend error mentioning permission or access | `PermissionDenied`   |
/// | any other backend-specific error              | `DeviceBusy`         |
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoInputDevice,

    #[error("input device refused access: {0}")]
    PermissionDenied(String),

    #[error("input device cannot provide a usable stream encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("input device is busy or unavailable: {0}")]
    DeviceBusy(String),

    #[error("recording too short: {got} bytes encoded, minimum {min}")]
    TooShort { got: usize, min: usize },

    #[error("capture ended unexpectedly")]
    Interrupted,
}

fn classify_backend(err: &cpal::BackendSpecificError) -> CaptureError {
    let description = err.description.to_lowercase();
    if description.contains("permission")
        || description.contains("denied")
        || description.contains("access")
    {
        CaptureError::PermissionDenied(err.description.clone())
    } else {
        CaptureError::DeviceBusy(err.description.clone())
    }
}

impl From<cpal::DevicesError> for CaptureError {
    fn from(err: cpal::DevicesError) -> Self {
        match err {
            cpal::DevicesError::BackendSpecific { err } => classify_backend(&err),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoInputDevice,
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                CaptureError::UnsupportedEncoding("stream type not supported".into())
            }
            cpal::DefaultStreamConfigError::BackendSpecific { err } => classify_backend(&err),
        }
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            // Enumeration saw the device, so failing to open it now means
            // someone else holds it.
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceBusy("input device disappeared while opening stream".into())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::UnsupportedEncoding("stream configuration not supported".into())
            }
            cpal::BuildStreamError::InvalidArgument => {
                CaptureError::UnsupportedEncoding("invalid stream configuration".into())
            }
            cpal::BuildStreamError::StreamIdOverflow => {
                CaptureError::DeviceBusy("backend ran out of stream identifiers".into())
            }
            cpal::BuildStreamError::BackendSpecific { err } => classify_backend(&err),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => {
                CaptureError::DeviceBusy("input device disappeared while starting stream".into())
            }
            cpal::PlayStreamError::BackendSpecific { err } => classify_backend(&err),
        }
    }
}

// ---------------------------------------------------------------------------
// MicrophoneCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use audio_digitizer::audio::{CaptureChunk, MicrophoneCapture};
/// use audio_digitizer::config::CaptureConfig;
///
/// let (tx, rx) = mpsc::channel::<CaptureChunk>();
/// let capture = MicrophoneCapture::open(&CaptureConfig::default()).unwrap();
/// let _handle = capture.start(tx).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop recording.
/// ```
pub struct MicrophoneCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Sample rate actually in effect (Hz).
    sample_rate: u32,
    /// Channel count actually in effect.
    channels: u16,
}

impl MicrophoneCapture {
    /// Open the configured input device (or the system default) and
    /// negotiate a stream shape.
    ///
    /// The preferred rate/channel shape from `config` is used when the
    /// device advertises it for `f32` samples; otherwise the device default
    /// shape is recorded and used as-is.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoInputDevice`] when enumeration comes up
    /// empty, [`CaptureError::UnsupportedEncoding`] when the device cannot
    /// produce `f32` samples, or the classified platform error.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let mut inputs = host.input_devices()?.peekable();
        if inputs.peek().is_none() {
            return Err(CaptureError::NoInputDevice);
        }

        let device = match &config.device {
            Some(name) => match inputs.find(|d| d.name().is_ok_and(|n| n == *name)) {
                Some(device) => device,
                None => {
                    log::warn!("capture: device {name:?} not found, using system default");
                    host.default_input_device()
                        .ok_or(CaptureError::NoInputDevice)?
                }
            },
            None => host
                .default_input_device()
                .ok_or(CaptureError::NoInputDevice)?,
        };

        let (stream_config, sample_rate, channels) = Self::negotiate(&device, config)?;
        log::debug!(
            "capture: opened {:?} at {sample_rate} Hz, {channels} ch",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        Ok(Self {
            device,
            config: stream_config,
            sample_rate,
            channels,
        })
    }

    /// Pick the stream shape: the preferred one when advertised, the device
    /// default otherwise.
    fn negotiate(
        device: &cpal::Device,
        want: &CaptureConfig,
    ) -> Result<(cpal::StreamConfig, u32, u16), CaptureError> {
        match device.supported_input_configs() {
            Ok(ranges) => {
                for range in ranges {
                    if range.sample_format() == cpal::SampleFormat::F32
                        && range.channels() == want.channels
                        && range.min_sample_rate().0 <= want.sample_rate
                        && want.sample_rate <= range.max_sample_rate().0
                    {
                        let supported = range.with_sample_rate(cpal::SampleRate(want.sample_rate));
                        let mut config: cpal::StreamConfig = supported.into();
                        config.buffer_size = cpal::BufferSize::Fixed(want.chunk_frames());
                        return Ok((config, want.sample_rate, want.channels));
                    }
                }
            }
            Err(err) => {
                log::debug!("capture: could not list supported configs: {err}");
            }
        }

        let supported = device.default_input_config()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(CaptureError::UnsupportedEncoding(format!(
                "device only offers {} samples",
                supported.sample_format()
            )));
        }
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        log::debug!("capture: preferred shape unavailable, using {sample_rate} Hz, {channels} ch");
        Ok((supported.into(), sample_rate, channels))
    }

    /// Start recording and send [`CaptureChunk`]s to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each time the
    /// hardware delivers a buffer the raw `f32` samples are wrapped in a
    /// [`CaptureChunk`] and forwarded over the channel.  Send errors
    /// (receiver dropped) are silently ignored so the audio thread never
    /// panics.  If the platform rejects the fixed chunk size the stream is
    /// rebuilt once with the device's default buffering.
    ///
    /// # Errors
    ///
    /// Returns the classified build/play error when the platform rejects
    /// the stream.
    pub fn start(&self, tx: mpsc::Sender<CaptureChunk>) -> Result<StreamHandle, CaptureError> {
        match self.build_stream(&self.config, tx.clone()) {
            Ok(stream) => Self::play(stream),
            Err(cpal::BuildStreamError::StreamConfigNotSupported)
                if matches!(self.config.buffer_size, cpal::BufferSize::Fixed(_)) =>
            {
                log::debug!("capture: fixed buffer size rejected, retrying with device default");
                let mut fallback = self.config.clone();
                fallback.buffer_size = cpal::BufferSize::Default;
                let stream = self.build_stream(&fallback, tx)?;
                Self::play(stream)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn build_stream(
        &self,
        config: &cpal::StreamConfig,
        tx: mpsc::Sender<CaptureChunk>,
    ) -> Result<cpal::Stream, cpal::BuildStreamError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        self.device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = CaptureChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )
    }

    fn play(stream: cpal::Stream) -> Result<StreamHandle, CaptureError> {
        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`CaptureChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
