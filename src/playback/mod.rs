//! Result playback module for Audio Digitizer.
//!
//! This module provides:
//! * [`PlaybackArbiter`] — single-flight playback over the variant store.
//! * [`AudioSink`] — trait for playback endpoints (one clip at a time).
//! * [`CpalSink`] — default-output-device sink with prepared buffers.
//! * [`decode_media`] / [`DecodedAudio`] — symphonia payload decoding.
//! * [`map_channels`] / [`resample_frames`] — device layout conversion.
//! * [`PlaybackError`] / [`SinkError`] / [`DecodeError`] — failure variants.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audio_digitizer::convert::new_shared_store;
//! use audio_digitizer::playback::{CpalSink, PlaybackArbiter};
//!
//! let store = new_shared_store();
//! let sink = CpalSink::open().unwrap();
//! let mut arbiter = PlaybackArbiter::new(store, sink);
//!
//! // Given a `ResultVariant` from a conversion round trip:
//! // arbiter.play(&variant).unwrap();   // silences anything playing first
//! // arbiter.replay().unwrap();        // restart from the top
//! // arbiter.stop();                   // silence and forget
//! ```

pub mod arbiter;
pub mod decode;
pub mod sink;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use arbiter::{PlaybackArbiter, PlaybackError};
pub use decode::{decode_media, DecodeError, DecodedAudio};
pub use sink::{map_channels, prepare_for_device, resample_frames, AudioSink, CpalSink, SinkError};
