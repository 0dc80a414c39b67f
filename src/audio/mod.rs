//! Audio capture side — microphone → chunk channel → collector → sample buffer.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → CaptureChunk (mpsc) → collector task
//!           → MonitorTap (levels/elapsed) + SampleBuffer (the recording)
//! ```
//!
//! Exactly one capture context is live at a time; the [`ContextRegistry`]
//! slot enforces that and force-releases a predecessor on re-acquisition.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use audio_digitizer::audio::{CaptureBackend, MicrophoneBackend};
//! use audio_digitizer::config::CaptureConfig;
//!
//! # async fn demo() {
//! let backend = MicrophoneBackend::new(CaptureConfig::default(), 20);
//! let session = backend.open().await.unwrap();
//! // ... record for a while ...
//! let recording = session.stop().await.unwrap(); // drains before returning
//! println!("{:.2}s captured", recording.duration_secs());
//! # }
//! ```

pub mod buffer;
pub mod capture;
pub mod monitor;
pub mod registry;
pub mod session;

pub use buffer::{BufferError, SampleBuffer, TimeRange};
pub use capture::{CaptureChunk, CaptureError, MicrophoneCapture, StreamHandle};
pub use monitor::{MonitorSnapshot, MonitorTap};
pub use registry::{ContextGuard, ContextRegistry};
pub use session::{
    ensure_min_encoded_size, ActiveCapture, CaptureBackend, MicrophoneBackend,
    MIN_ENCODED_WAV_BYTES,
};
