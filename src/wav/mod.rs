//! WAV container packing and unpacking.
//!
//! The service side of the pipeline only ever sees finished containers:
//! capture hands a [`crate::audio::SampleBuffer`] to [`encode`], the result
//! is uploaded as `audio.wav`.  [`decode`] is the inverse, used by tests and
//! anywhere a container needs to come back apart.

pub mod decoder;
pub mod encoder;

pub use decoder::{decode, dequantize_sample, WavDecodeError};
pub use encoder::{encode, quantize_sample, EncodeError, EncodedWav};
