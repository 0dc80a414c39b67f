//! Recorder orchestration for the audio digitizer.
//!
//! This module wires the full capture → encode → convert loop and exposes
//! the shared state that the frontend reads every frame.
//!
//! # Architecture
//!
//! ```text
//! RecorderCommand (mpsc)
//!        │
//!        ▼
//! RecorderOrchestrator::run()  ← async tokio task
//!        │
//!        ├─ Start → begin_epoch, open CaptureBackend      → Recording
//!        │
//!        └─ Stop
//!              │
//!              ├─ drain ActiveCapture into a SampleBuffer
//!              ├─ slice the selection, gate short takes   → Processing
//!              ├─ encode WAV, ConversionService::submit
//!              └─ publish ResultVariants                  → Results / Error
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by the frontend each frame
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use audio_digitizer::audio::MicrophoneBackend;
//! use audio_digitizer::config::AppConfig;
//! use audio_digitizer::convert::{new_shared_store, HttpConversionClient};
//! use audio_digitizer::recorder::{new_shared_state, RecorderCommand, RecorderOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let store = new_shared_store();
//!     let shared_state = new_shared_state(config.clone());
//!
//!     let backend = Arc::new(MicrophoneBackend::new(
//!         config.capture.clone(),
//!         config.ui.monitor_bars,
//!     ));
//!     let service = Arc::new(HttpConversionClient::from_config(&config.api, store.clone()));
//!
//!     let (command_tx, command_rx) = mpsc::channel(16);
//!     let orchestrator = RecorderOrchestrator::new(
//!         shared_state.clone(),
//!         backend,
//!         service,
//!         store,
//!         &command_tx,
//!     );
//!
//!     tokio::spawn(async move { orchestrator.run(command_rx).await });
//!
//!     command_tx.send(RecorderCommand::Start).await.ok();
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{RecorderCommand, RecorderOrchestrator};
pub use state::{new_shared_state, AppState, Notice, RecorderState, SharedState};
