//! Audio digitizer — record from a microphone, convert through a backend
//! service, and play back the returned variants.
//!
//! The crate is organised as a set of small modules around one shared
//! state object:
//!
//! - [`audio`] — cpal microphone capture, sample buffers, level monitor.
//! - [`wav`] — PCM WAV encoding of captured takes.
//! - [`convert`] — HTTP submission to the conversion backend and the
//!   variant store that owns the returned payloads.
//! - [`playback`] — symphonia decoding and cpal output with single-flight
//!   arbitration.
//! - [`recorder`] — the orchestrator that drives the whole lifecycle and
//!   the [`recorder::SharedState`] the frontend renders from.
//! - [`config`] — TOML configuration and platform paths.
//!
//! # Architecture
//!
//! ```text
//!                 RecorderCommand (mpsc)
//!                        │
//!                        ▼
//!  MicrophoneBackend → RecorderOrchestrator → HttpConversionClient
//!        (cpal)               │                    (reqwest)
//!                             ▼
//!                       SharedState ───▶ frontend ───▶ PlaybackArbiter
//!                      + VariantStore                     (symphonia + cpal)
//! ```

pub mod audio;
pub mod config;
pub mod convert;
pub mod playback;
pub mod recorder;
pub mod wav;
