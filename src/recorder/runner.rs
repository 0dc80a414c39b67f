//! Recorder orchestrator — drives the full capture → encode → convert loop.
//!
//! [`RecorderOrchestrator`] owns the [`SharedState`] and responds to
//! [`RecorderCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Recorder flow
//!
//! ```text
//! RecorderCommand::Start
//!   └─▶ revoke previous handles, open capture session    [Recording]
//!         └─ open fails → notice, stay Idle
//!
//! RecorderCommand::Stop
//!   └─▶ drain session → slice selection → encode → submit [Processing]
//!         ├─ Ok  → publish variants                       [Results]
//!         └─ Err → notice + dismiss timer                 [Error]
//!
//! RecorderCommand::NoticeTimeout(seq)
//!   └─▶ clear matching notice; Error → Idle
//! ```
//!
//! Commands are handled strictly one at a time, so a second stop can never
//! race a submission already in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::audio::{ensure_min_encoded_size, ActiveCapture, CaptureBackend, CaptureError, TimeRange};
use crate::convert::{
    BitDepth, ConversionService, ResultVariant, SharedVariantStore, SubmissionError, SubmitRequest,
    VariantFormat,
};
use crate::wav::encode;

use super::state::{RecorderState, SharedState};

// ---------------------------------------------------------------------------
// RecorderCommand
// ---------------------------------------------------------------------------

/// Commands accepted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderCommand {
    /// Start a new recording, revoking any previous results.
    Start,

    /// Stop the current recording and submit it for conversion.
    Stop,

    /// Set or clear the time selection applied at the next stop.
    SetSelection(Option<TimeRange>),

    /// Dismiss the visible notice; leaves the Error state if in it.
    AcknowledgeError,

    /// A notice's dismiss timer fired.  Ignored unless the sequence number
    /// still matches the notice on screen.
    NoticeTimeout(u64),
}

// ---------------------------------------------------------------------------
// User-facing messages
// ---------------------------------------------------------------------------

/// User-facing message for a capture failure.
fn describe_capture_error(err: &CaptureError) -> String {
    match err {
        CaptureError::NoInputDevice => "No se detectaron micrófonos".into(),
        CaptureError::PermissionDenied(_) => "Permiso de micrófono denegado".into(),
        CaptureError::UnsupportedEncoding(_) => {
            "Formato de captura no soportado por el dispositivo".into()
        }
        CaptureError::DeviceBusy(_) => "El micrófono está en uso por otra aplicación".into(),
        CaptureError::TooShort { .. } => "La grabación es demasiado corta".into(),
        CaptureError::Interrupted => "La grabación se interrumpió".into(),
    }
}

/// User-facing message for a conversion failure.
fn describe_submission_error(err: &SubmissionError) -> String {
    match err {
        SubmissionError::NetworkFailure(_) => "Error de red al procesar el audio".into(),
        SubmissionError::DecodeFailure(_) => "No se pudo decodificar el audio grabado".into(),
        SubmissionError::EmptyResultSet => "El backend no devolvió resultados".into(),
        SubmissionError::ServerError(status) => {
            format!("El servidor respondió con un error ({status})")
        }
    }
}

const SELECTION_EMPTY_MESSAGE: &str = "La selección no contiene audio";

// ---------------------------------------------------------------------------
// RecorderOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete recording lifecycle.
///
/// Create with [`RecorderOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use audio_digitizer::audio::MicrophoneBackend;
/// use audio_digitizer::config::AppConfig;
/// use audio_digitizer::convert::{new_shared_store, HttpConversionClient};
/// use audio_digitizer::recorder::{new_shared_state, RecorderOrchestrator};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let store = new_shared_store();
/// let state = new_shared_state(config.clone());
///
/// let backend = Arc::new(MicrophoneBackend::new(
///     config.capture.clone(),
///     config.ui.monitor_bars,
/// ));
/// let service = Arc::new(HttpConversionClient::from_config(&config.api, store.clone()));
///
/// let (command_tx, command_rx) = tokio::sync::mpsc::channel(16);
/// let orchestrator = RecorderOrchestrator::new(state, backend, service, store, &command_tx);
/// orchestrator.run(command_rx).await;
/// # }
/// ```
pub struct RecorderOrchestrator {
    state: SharedState,
    backend: Arc<dyn CaptureBackend>,
    service: Arc<dyn ConversionService>,
    store: SharedVariantStore,
    /// Weak so pending dismiss timers never keep the command channel open.
    notice_tx: mpsc::WeakSender<RecorderCommand>,
}

impl RecorderOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`      — shared application state (also read by the frontend).
    /// * `backend`    — capture backend (e.g. `MicrophoneBackend`).
    /// * `service`    — conversion backend (e.g. `HttpConversionClient`).
    /// * `store`      — variant store shared with the conversion client.
    /// * `command_tx` — the channel commands arrive on; kept as a weak
    ///   sender for self-addressed notice timeouts.
    pub fn new(
        state: SharedState,
        backend: Arc<dyn CaptureBackend>,
        service: Arc<dyn ConversionService>,
        store: SharedVariantStore,
        command_tx: &mpsc::Sender<RecorderCommand>,
    ) -> Self {
        Self {
            state,
            backend,
            service,
            store,
            notice_tx: command_tx.downgrade(),
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `command_rx` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`.  It never returns while the channel is open.
    pub async fn run(self, mut command_rx: mpsc::Receiver<RecorderCommand>) {
        let mut session: Option<Box<dyn ActiveCapture>> = None;

        while let Some(command) = command_rx.recv().await {
            match command {
                RecorderCommand::Start => self.handle_start(&mut session).await,
                RecorderCommand::Stop => self.handle_stop(&mut session).await,
                RecorderCommand::SetSelection(range) => self.handle_selection(range),
                RecorderCommand::AcknowledgeError => self.clear_notice(),
                RecorderCommand::NoticeTimeout(seq) => self.handle_notice_timeout(seq),
            }
        }

        // Dropping a live session stops its stream and releases the device.
        drop(session);
        log::info!("recorder: command channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Handle start: revoke stale results, open a capture session.
    async fn handle_start(&self, session: &mut Option<Box<dyn ActiveCapture>>) {
        {
            let st = self.state.lock().unwrap();
            if st.recorder.is_busy() {
                log::warn!("recorder: start ignored while {}", st.recorder.label());
                return;
            }
        }

        log::debug!("recorder: Start → Recording");

        // ── 1. Revoke everything the previous take published ─────────────
        let released = {
            let mut store = lock_store(&self.store);
            store.begin_epoch()
        };
        if released > 0 {
            log::debug!("recorder: revoked {released} stale variant handles");
        }

        {
            let mut st = self.state.lock().unwrap();
            st.variants.clear();
            st.selection = None;
            st.notice = None;
            st.recording_secs = 0.0;
        }

        // ── 2. Open the microphone ───────────────────────────────────────
        match self.backend.open().await {
            Ok(active) => {
                let tap = active.monitor();
                {
                    let mut st = self.state.lock().unwrap();
                    st.monitor = Some(tap);
                    st.recorder = RecorderState::Recording;
                }
                *session = Some(active);
            }
            Err(e) => {
                // Nothing was captured, so this is not an Error-state
                // failure: stay Idle and show what went wrong.
                log::error!("recorder: could not open capture: {e}");
                self.post_notice(describe_capture_error(&e));
            }
        }
    }

    /// Handle stop: drain the session, encode, submit, publish.
    async fn handle_stop(&self, session: &mut Option<Box<dyn ActiveCapture>>) {
        let Some(active) = session.take() else {
            log::warn!("recorder: stop ignored with no active session");
            return;
        };

        log::debug!(
            "recorder: Stop after {:.2}s → Processing",
            active.elapsed_secs()
        );
        let entered_processing = Instant::now();
        {
            let mut st = self.state.lock().unwrap();
            st.recorder = RecorderState::Processing;
            st.monitor = None;
        }

        let outcome = self.finish_take(active).await;

        // The processing phase stays visible for a floor duration so fast
        // round trips do not flash through it.
        self.hold_processing_floor(entered_processing).await;

        match outcome {
            Ok(variants) => {
                log::info!("recorder: conversion produced {} variants", variants.len());
                let mut st = self.state.lock().unwrap();
                st.variants = variants;
                st.recorder = RecorderState::Results;
            }
            Err(message) => {
                self.fail(message);
            }
        }
    }

    fn handle_selection(&self, range: Option<TimeRange>) {
        let mut st = self.state.lock().unwrap();
        st.selection = range;
        match range {
            Some(r) => log::debug!("recorder: selection {:.2}s..{:.2}s", r.start_secs, r.end_secs),
            None => log::debug!("recorder: selection cleared"),
        }
    }

    fn handle_notice_timeout(&self, seq: u64) {
        let mut st = self.state.lock().unwrap();
        let still_current = st.notice.as_ref().map(|n| n.seq == seq).unwrap_or(false);
        if still_current {
            st.notice = None;
            if st.recorder == RecorderState::Error {
                st.recorder = RecorderState::Idle;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Take processing
    // -----------------------------------------------------------------------

    /// Drain, slice, gate, encode and submit one take.
    ///
    /// Returns the published variants, or the user-facing message for
    /// whatever went wrong (the cause is logged here at error level).
    async fn finish_take(
        &self,
        active: Box<dyn ActiveCapture>,
    ) -> Result<Vec<ResultVariant>, String> {
        // ── 1. Drain the session into a full-take buffer ─────────────────
        let buffer = match active.stop().await {
            Ok(buffer) => buffer,
            Err(e) => {
                log::error!("recorder: capture failed: {e}");
                return Err(describe_capture_error(&e));
            }
        };

        {
            let mut st = self.state.lock().unwrap();
            st.recording_secs = buffer.duration_secs();
        }

        // ── 2. Apply the time selection, if one is set ───────────────────
        let (selection, bit_depth_cfg, format_cfg) = {
            let st = self.state.lock().unwrap();
            (
                st.selection,
                st.config.convert.bit_depth,
                st.config.convert.format.clone(),
            )
        };

        let (buffer, use_selection) = match selection {
            Some(range) => match buffer.slice_seconds(range) {
                Ok(sliced) => {
                    log::debug!(
                        "recorder: submitting selection {:.2}s..{:.2}s ({:.2}s of {:.2}s)",
                        range.start_secs,
                        range.end_secs,
                        sliced.duration_secs(),
                        buffer.duration_secs()
                    );
                    (sliced, true)
                }
                Err(e) => {
                    log::error!("recorder: selection rejected: {e}");
                    return Err(SELECTION_EMPTY_MESSAGE.to_string());
                }
            },
            None => (buffer, false),
        };

        // ── 3. Short-take gate + encode ──────────────────────────────────
        if let Err(e) = ensure_min_encoded_size(&buffer) {
            log::error!("recorder: {e}");
            return Err(describe_capture_error(&e));
        }

        let wav = match encode(&buffer) {
            Ok(wav) => wav,
            Err(e) => {
                log::error!("recorder: encoding failed: {e}");
                return Err("No se pudo codificar la grabación".to_string());
            }
        };

        // ── 4. Submit for conversion ─────────────────────────────────────
        let bit_depth = BitDepth::try_from(i64::from(bit_depth_cfg)).unwrap_or_else(|e| {
            log::warn!("recorder: {e}; requesting 16-bit instead");
            BitDepth::Sixteen
        });
        let format = format_cfg.as_deref().and_then(|s| {
            s.parse::<VariantFormat>()
                .map_err(|e| log::warn!("recorder: {e}; requesting every format"))
                .ok()
        });

        let request = SubmitRequest {
            wav,
            bit_depth,
            use_selection,
            format,
        };

        match self.service.submit(request).await {
            Ok(variants) => Ok(variants),
            Err(e) => {
                log::error!("recorder: submission failed: {e}");
                Err(describe_submission_error(&e))
            }
        }
    }

    /// Sleep out whatever remains of the minimum processing window.
    async fn hold_processing_floor(&self, entered: Instant) {
        let floor = {
            let st = self.state.lock().unwrap();
            Duration::from_millis(st.config.convert.min_processing_ms)
        };
        let elapsed = entered.elapsed();
        if elapsed < floor {
            tokio::time::sleep(floor - elapsed).await;
        }
    }

    // -----------------------------------------------------------------------
    // Notices
    // -----------------------------------------------------------------------

    /// Enter the Error state with a notice and arm its dismiss timer.
    fn fail(&self, message: String) {
        log::error!("recorder error: {message}");
        let (seq, dismiss_ms) = {
            let mut st = self.state.lock().unwrap();
            st.recorder = RecorderState::Error;
            let seq = st.post_notice(message);
            (seq, st.config.ui.notice_dismiss_ms)
        };
        self.spawn_notice_timer(seq, dismiss_ms);
    }

    /// Show a notice without changing state and arm its dismiss timer.
    fn post_notice(&self, message: String) {
        let (seq, dismiss_ms) = {
            let mut st = self.state.lock().unwrap();
            let seq = st.post_notice(message);
            (seq, st.config.ui.notice_dismiss_ms)
        };
        self.spawn_notice_timer(seq, dismiss_ms);
    }

    fn spawn_notice_timer(&self, seq: u64, dismiss_ms: u64) {
        let tx = self.notice_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(dismiss_ms)).await;
            // Upgrade fails once the frontend is gone; the notice then
            // no longer has a screen to be dismissed from.
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(RecorderCommand::NoticeTimeout(seq)).await;
            }
        });
    }

    fn clear_notice(&self) {
        let mut st = self.state.lock().unwrap();
        st.notice = None;
        if st.recorder == RecorderState::Error {
            st.recorder = RecorderState::Idle;
        }
    }
}

fn lock_store(store: &SharedVariantStore) -> std::sync::MutexGuard<'_, crate::convert::VariantStore> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
