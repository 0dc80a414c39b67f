//! Recording session lifecycle: open, accumulate, stop-and-drain.
//!
//! A [`MicrophoneSession`] splits capture across two homes.  A dedicated
//! `capture-audio` std thread owns the cpal stream (cpal streams are not
//! `Send` on every platform) and a tokio collector task accumulates the
//! chunks the stream callback emits.  Stopping works by dropping the stream
//! first: the chunk channel closes behind it, the collector drains every
//! chunk still queued, and only then does the completion future resolve
//! with the finished [`SampleBuffer`].  The collector finishing — not the
//! stop request — is what callers await, so no tail audio is lost.
//!
//! ```text
//!  capture-audio thread          tokio
//!  ┌──────────────────┐   chunks   ┌────────────┐
//!  │ cpal stream ──▶ tx ─────────▶ │ collector  │──▶ SampleBuffer
//!  │ waits on stop_rx │            │ + monitor  │
//!  └──────────────────┘            └────────────┘
//! ```

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};

use super::buffer::{BufferError, SampleBuffer};
use super::capture::{CaptureChunk, CaptureError, MicrophoneCapture};
use super::monitor::MonitorTap;
use super::registry::{ContextGuard, ContextRegistry};
use crate::config::CaptureConfig;

// ---------------------------------------------------------------------------
// Validity gate
// ---------------------------------------------------------------------------

/// Smallest WAV container worth submitting, header included.  Recordings
/// that would encode below this are rejected before any network traffic.
pub const MIN_ENCODED_WAV_BYTES: usize = 2_000;

/// Rejects buffers whose encoded container would fall under
/// [`MIN_ENCODED_WAV_BYTES`].
///
/// # Errors
///
/// [`CaptureError::TooShort`] carrying the projected and minimum sizes.
pub fn ensure_min_encoded_size(buffer: &SampleBuffer) -> Result<(), CaptureError> {
    let got = buffer.encoded_wav_size();
    if got < MIN_ENCODED_WAV_BYTES {
        return Err(CaptureError::TooShort {
            got,
            min: MIN_ENCODED_WAV_BYTES,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait seams
// ---------------------------------------------------------------------------

/// Opens recording sessions.  The orchestrator only sees this seam, so
/// tests can drive it without a microphone.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Open the device and start recording.
    async fn open(&self) -> Result<Box<dyn ActiveCapture>, CaptureError>;
}

/// One in-progress recording.
#[async_trait]
pub trait ActiveCapture: Send {
    /// Stop the stream, drain every pending chunk and hand back the
    /// finished recording.
    async fn stop(self: Box<Self>) -> Result<SampleBuffer, CaptureError>;

    /// Live level/elapsed tap for this recording.
    fn monitor(&self) -> MonitorTap;

    /// Seconds of audio observed so far.
    fn elapsed_secs(&self) -> f64;
}

// ---------------------------------------------------------------------------
// MicrophoneBackend
// ---------------------------------------------------------------------------

/// The real capture backend: cpal microphone plus the process-wide context
/// registry.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    monitor_bars: usize,
    registry: Arc<ContextRegistry>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig, monitor_bars: usize) -> Self {
        Self::with_registry(config, monitor_bars, Arc::clone(ContextRegistry::global()))
    }

    /// Use an explicit registry instead of the process-wide one.
    pub fn with_registry(
        config: CaptureConfig,
        monitor_bars: usize,
        registry: Arc<ContextRegistry>,
    ) -> Self {
        Self {
            config,
            monitor_bars,
            registry,
        }
    }
}

#[async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn open(&self) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let guard = self.registry.acquire(stop_tx.clone());

        let (setup_tx, setup_rx) = oneshot::channel::<Result<(u32, u16), CaptureError>>();
        let (chunk_tx, chunk_rx) = tokio_mpsc::unbounded_channel::<CaptureChunk>();

        let config = self.config.clone();
        thread::Builder::new()
            .name("capture-audio".into())
            .spawn(move || run_capture_thread(config, chunk_tx, setup_tx, stop_rx))
            .map_err(|err| {
                log::error!("capture: could not spawn capture thread: {err}");
                CaptureError::Interrupted
            })?;

        let (sample_rate, channels) = match setup_rx.await {
            Ok(result) => result?,
            // The thread died before reporting; treat it like a lost stream.
            Err(_) => return Err(CaptureError::Interrupted),
        };

        let tap = MonitorTap::new(sample_rate, self.monitor_bars);
        let done = tokio::spawn(collect_chunks(chunk_rx, tap.clone(), sample_rate, channels));

        log::debug!("session: recording started at {sample_rate} Hz, {channels} ch");
        Ok(Box::new(MicrophoneSession {
            stop_tx,
            done,
            tap,
            started_at: Instant::now(),
            _guard: guard,
        }))
    }
}

/// Body of the `capture-audio` thread: owns the cpal stream for the whole
/// recording and drops it when the stop channel fires or every sender is
/// gone.
fn run_capture_thread(
    config: CaptureConfig,
    chunk_tx: tokio_mpsc::UnboundedSender<CaptureChunk>,
    setup_tx: oneshot::Sender<Result<(u32, u16), CaptureError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let capture = match MicrophoneCapture::open(&config) {
        Ok(capture) => capture,
        Err(err) => {
            let _ = setup_tx.send(Err(err));
            return;
        }
    };

    let (callback_tx, callback_rx) = mpsc::channel::<CaptureChunk>();
    let handle = match capture.start(callback_tx) {
        Ok(handle) => handle,
        Err(err) => {
            let _ = setup_tx.send(Err(err));
            return;
        }
    };

    let sample_rate = capture.sample_rate();
    let channels = capture.channels();
    if setup_tx.send(Ok((sample_rate, channels))).is_err() {
        // Caller went away before setup finished.
        return;
    }

    // Forward callback chunks until asked to stop.  recv_timeout keeps the
    // stop channel responsive without a second thread.
    loop {
        match callback_rx.recv_timeout(std::time::Duration::from_millis(20)) {
            Ok(chunk) => {
                if chunk_tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }
    }

    // Stop the hardware stream, then flush whatever the callback already
    // queued so the collector sees the full tail.
    drop(handle);
    while let Ok(chunk) = callback_rx.try_recv() {
        if chunk_tx.send(chunk).is_err() {
            break;
        }
    }
    log::debug!("session: capture thread exiting");
}

/// Accumulates chunks until the channel closes, feeding the monitor tap on
/// the way through.
async fn collect_chunks(
    mut chunk_rx: tokio_mpsc::UnboundedReceiver<CaptureChunk>,
    tap: MonitorTap,
    sample_rate: u32,
    channels: u16,
) -> Result<SampleBuffer, CaptureError> {
    let mut samples: Vec<f32> = Vec::new();
    while let Some(chunk) = chunk_rx.recv().await {
        tap.push_chunk(&chunk.samples, chunk.channels);
        samples.extend_from_slice(&chunk.samples);
    }

    match SampleBuffer::from_interleaved(sample_rate, channels, &samples) {
        Ok(buffer) => Ok(buffer),
        // Stop before the first chunk arrived: an empty recording is just
        // the shortest possible too-short capture.
        Err(BufferError::Empty) => Err(CaptureError::TooShort {
            got: 44,
            min: MIN_ENCODED_WAV_BYTES,
        }),
        Err(err) => {
            log::error!("session: capture produced an invalid buffer: {err}");
            Err(CaptureError::Interrupted)
        }
    }
}

// ---------------------------------------------------------------------------
// MicrophoneSession
// ---------------------------------------------------------------------------

/// Live recording handle.
///
/// Dropping the session without calling [`ActiveCapture::stop`] still shuts
/// everything down: the stop sender and the registry slot go away with the
/// struct, the capture thread notices and drops the stream, and the
/// detached collector finishes on its own.
struct MicrophoneSession {
    stop_tx: mpsc::Sender<()>,
    done: tokio::task::JoinHandle<Result<SampleBuffer, CaptureError>>,
    tap: MonitorTap,
    started_at: Instant,
    _guard: ContextGuard,
}

#[async_trait]
impl ActiveCapture for MicrophoneSession {
    async fn stop(self: Box<Self>) -> Result<SampleBuffer, CaptureError> {
        let _ = self.stop_tx.send(());
        let buffer = match self.done.await {
            Ok(result) => result?,
            Err(err) => {
                log::error!("session: collector task lost: {err}");
                return Err(CaptureError::Interrupted);
            }
        };
        log::debug!(
            "session: stopped after {:.2}s wall clock, {:.2}s audio",
            self.started_at.elapsed().as_secs_f64(),
            buffer.duration_secs()
        );
        Ok(buffer)
    }

    fn monitor(&self) -> MonitorTap {
        self.tap.clone()
    }

    fn elapsed_secs(&self) -> f64 {
        self.tap.snapshot().elapsed_secs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(samples: Vec<f32>, channels: u16) -> CaptureChunk {
        CaptureChunk {
            samples,
            sample_rate: 44_100,
            channels,
        }
    }

    // ---- Validity gate -----------------------------------------------------

    #[test]
    fn gate_passes_at_exactly_the_minimum() {
        // 978 mono frames encode to 44 + 1956 = 2000 bytes.
        let buffer = SampleBuffer::new(44_100, vec![vec![0.0; 978]]).unwrap();
        assert_eq!(buffer.encoded_wav_size(), MIN_ENCODED_WAV_BYTES);
        assert!(ensure_min_encoded_size(&buffer).is_ok());
    }

    #[test]
    fn gate_rejects_one_frame_under() {
        let buffer = SampleBuffer::new(44_100, vec![vec![0.0; 977]]).unwrap();
        let err = ensure_min_encoded_size(&buffer).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::TooShort {
                got: 1_998,
                min: MIN_ENCODED_WAV_BYTES
            }
        ));
    }

    #[test]
    fn gate_rejects_a_900_byte_capture() {
        // 428 mono frames encode to 44 + 856 = 900 bytes.
        let buffer = SampleBuffer::new(44_100, vec![vec![0.0; 428]]).unwrap();
        let err = ensure_min_encoded_size(&buffer).unwrap_err();
        assert!(matches!(err, CaptureError::TooShort { got: 900, .. }));
    }

    // ---- Collector ---------------------------------------------------------

    #[tokio::test]
    async fn collector_drains_everything_queued_before_close() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let tap = MonitorTap::new(44_100, 8);

        // Queue three chunks, then close the channel before the collector
        // even starts: it must still see all of them.
        tx.send(chunk(vec![0.1; 4_410], 1)).unwrap();
        tx.send(chunk(vec![0.2; 4_410], 1)).unwrap();
        tx.send(chunk(vec![0.3; 2_205], 1)).unwrap();
        drop(tx);

        let buffer = collect_chunks(rx, tap.clone(), 44_100, 1).await.unwrap();
        assert_eq!(buffer.frames(), 4_410 + 4_410 + 2_205);
        assert_eq!(tap.snapshot().frames, 11_025);
        assert_eq!(tap.snapshot().levels.len(), 3);
    }

    #[tokio::test]
    async fn collector_preserves_chunk_order() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        tx.send(chunk(vec![0.1, 0.2], 1)).unwrap();
        tx.send(chunk(vec![0.3, 0.4], 1)).unwrap();
        drop(tx);

        let buffer = collect_chunks(rx, MonitorTap::new(44_100, 4), 44_100, 1)
            .await
            .unwrap();
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[tokio::test]
    async fn empty_capture_reports_too_short() {
        let (tx, rx) = tokio_mpsc::unbounded_channel::<CaptureChunk>();
        drop(tx);

        let err = collect_chunks(rx, MonitorTap::new(44_100, 4), 44_100, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::TooShort { got: 44, .. }));
    }

    #[tokio::test]
    async fn collector_deinterleaves_stereo() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        tx.send(chunk(vec![0.1, -0.1, 0.2, -0.2], 2)).unwrap();
        drop(tx);

        let buffer = collect_chunks(rx, MonitorTap::new(44_100, 4), 44_100, 2)
            .await
            .unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.channel(0), &[0.1, 0.2]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2]);
    }

    // ---- Seams -------------------------------------------------------------

    /// Both seams must stay object-safe; the orchestrator stores them boxed.
    #[test]
    fn seams_are_object_safe() {
        fn _backend(_: &dyn CaptureBackend) {}
        fn _session(_: Box<dyn ActiveCapture>) {}
    }
}
