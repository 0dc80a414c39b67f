//! Recorder state machine and shared application state.
//!
//! [`RecorderState`] drives the orchestrator's state machine.  The frontend
//! reads it via [`SharedState`] to render the appropriate view.
//!
//! [`AppState`] is the single source of truth for everything the frontend
//! needs: current recorder phase, live level monitor, published result
//! variants, the active time selection, config snapshot, and any notice
//! banner.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across threads.

use std::sync::{Arc, Mutex};

use crate::audio::{MonitorTap, TimeRange};
use crate::config::AppConfig;
use crate::convert::ResultVariant;

// ---------------------------------------------------------------------------
// RecorderState
// ---------------------------------------------------------------------------

/// States of the recording lifecycle.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ Processing
///                                       ├─ encode + submit ok ──▶ Results
///                                       └─ any failure ─────────▶ Error
/// Results ──new start──▶ Recording   (previous handles revoked)
/// Error ──acknowledge / notice timeout──▶ Idle
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderState {
    /// Waiting for the user to start a recording.
    Idle,

    /// Microphone is active; chunks are flowing into the capture session.
    Recording,

    /// The take has been drained and is being encoded and converted.
    Processing,

    /// Conversion succeeded; the published variant set is non-empty.
    Results,

    /// A recoverable error occurred.  The recorder returns to `Idle` once
    /// the notice is acknowledged or times out.
    Error,
}

impl RecorderState {
    /// Returns `true` while a take is being captured or converted.
    ///
    /// The frontend uses this to refuse a new start mid-take.
    ///
    /// ```
    /// use audio_digitizer::recorder::RecorderState;
    ///
    /// assert!(!RecorderState::Idle.is_busy());
    /// assert!(RecorderState::Recording.is_busy());
    /// assert!(RecorderState::Processing.is_busy());
    /// assert!(!RecorderState::Results.is_busy());
    /// assert!(!RecorderState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, RecorderState::Recording | RecorderState::Processing)
    }

    /// Short label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            RecorderState::Idle => "Listo",
            RecorderState::Recording => "Grabando",
            RecorderState::Processing => "Procesando",
            RecorderState::Results => "Resultados",
            RecorderState::Error => "Error",
        }
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        RecorderState::Idle
    }
}

// ---------------------------------------------------------------------------
// Notice
// ---------------------------------------------------------------------------

/// A transient banner message with a sequence number.
///
/// The sequence number lets a dismiss timer tell whether the notice it was
/// armed for is still the one on screen; a stale timer must not clear a
/// newer notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub seq: u64,
    pub message: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state — the single source of truth for the frontend.
///
/// Held behind [`SharedState`] (`Arc<Mutex<AppState>>`).  The recorder
/// orchestrator mutates it; the frontend reads it on demand.
pub struct AppState {
    /// Current phase of the recording lifecycle.
    pub recorder: RecorderState,

    /// Live level monitor for the active capture session.
    ///
    /// `Some` only while `recorder == RecorderState::Recording`.
    pub monitor: Option<MonitorTap>,

    /// Duration of the last completed take in seconds.
    ///
    /// Reset to `0.0` when a new recording starts; set from the drained
    /// buffer when it stops.
    pub recording_secs: f64,

    /// Result variants published by the last successful conversion.
    ///
    /// Cleared (and their handles revoked) when a new recording starts.
    pub variants: Vec<ResultVariant>,

    /// Time selection applied at the next stop, if any.
    pub selection: Option<TimeRange>,

    /// Banner to display, if any.  When `recorder` is
    /// [`RecorderState::Error`] this carries the error text.
    pub notice: Option<Notice>,

    /// Current application configuration.
    ///
    /// The orchestrator reads the convert and UI sections from here.
    pub config: AppConfig,

    next_notice_seq: u64,
}

impl AppState {
    /// Create a new `AppState` in the idle phase.
    pub fn new(config: AppConfig) -> Self {
        Self {
            recorder: RecorderState::Idle,
            monitor: None,
            recording_secs: 0.0,
            variants: Vec::new(),
            selection: None,
            notice: None,
            config,
            next_notice_seq: 0,
        }
    }

    /// Replace the visible notice and return its sequence number.
    pub fn post_notice(&mut self, message: String) -> u64 {
        self.next_notice_seq += 1;
        let seq = self.next_notice_seq;
        self.notice = Some(Notice { seq, message });
        seq
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a fresh [`AppState`].
pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
