//! Live input monitor fed during recording.
//!
//! The capture collector pushes every chunk it receives through a
//! [`MonitorTap`]; the front end polls [`MonitorTap::snapshot`] to render a
//! level meter and the elapsed-time counter.  The tap only observes — chunks
//! still land in the recording unchanged.
//!
//! # Example
//!
//! ```rust
//! use audio_digitizer::audio::MonitorTap;
//!
//! let tap = MonitorTap::new(44_100, 20);
//! tap.push_chunk(&[0.5; 4_410], 1);
//! let snap = tap.snapshot();
//! assert_eq!(snap.levels.len(), 1);
//! assert!((snap.elapsed_secs - 0.1).abs() < 1e-6);
//! ```

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// MonitorTap
// ---------------------------------------------------------------------------

/// Point-in-time view of the monitor: newest level last.
#[derive(Debug, Clone, Default)]
pub struct MonitorSnapshot {
    /// RMS level per received chunk, clamped to `[0.0, 1.0]`, oldest first.
    pub levels: Vec<f32>,
    /// Frames observed so far.
    pub frames: u64,
    /// Recording time represented by `frames`.
    pub elapsed_secs: f64,
}

struct MonitorInner {
    levels: Vec<f32>,
    frames: u64,
}

/// Cloneable handle onto one recording's live levels.
///
/// All clones observe the same state; a new recording gets a fresh tap.
#[derive(Clone)]
pub struct MonitorTap {
    inner: Arc<Mutex<MonitorInner>>,
    sample_rate: u32,
    capacity: usize,
}

impl MonitorTap {
    /// Create a tap holding at most `capacity` level bars.
    pub fn new(sample_rate: u32, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                levels: Vec::with_capacity(capacity),
                frames: 0,
            })),
            sample_rate,
            capacity,
        }
    }

    /// Record one interleaved chunk: its RMS becomes the newest level bar
    /// and its frame count advances the elapsed counter.
    pub fn push_chunk(&self, samples: &[f32], channels: u16) {
        if samples.is_empty() || channels == 0 {
            return;
        }
        let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let rms = mean_sq.sqrt().min(1.0);

        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.capacity > 0 {
            if inner.levels.len() == self.capacity {
                inner.levels.remove(0);
            }
            inner.levels.push(rms);
        }
        inner.frames += (samples.len() / channels as usize) as u64;
    }

    /// Copy the current levels and elapsed time out of the tap.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        MonitorSnapshot {
            levels: inner.levels.clone(),
            frames: inner.frames,
            elapsed_secs: inner.frames as f64 / self.sample_rate as f64,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for MonitorTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("MonitorTap")
            .field("sample_rate", &self.sample_rate)
            .field("levels", &snap.levels.len())
            .field("frames", &snap.frames)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_chunk() {
        let tap = MonitorTap::new(16_000, 10);
        tap.push_chunk(&[0.5; 1_600], 1);
        let snap = tap.snapshot();
        assert_eq!(snap.levels.len(), 1);
        assert!((snap.levels[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn levels_clamped_to_unit_range() {
        let tap = MonitorTap::new(16_000, 10);
        tap.push_chunk(&[4.0; 100], 1);
        assert_eq!(tap.snapshot().levels[0], 1.0);
    }

    #[test]
    fn oldest_level_evicted_at_capacity() {
        let tap = MonitorTap::new(16_000, 3);
        tap.push_chunk(&[0.1; 100], 1);
        tap.push_chunk(&[0.2; 100], 1);
        tap.push_chunk(&[0.3; 100], 1);
        tap.push_chunk(&[0.4; 100], 1);

        let levels = tap.snapshot().levels;
        assert_eq!(levels.len(), 3);
        assert!((levels[0] - 0.2).abs() < 1e-4);
        assert!((levels[2] - 0.4).abs() < 1e-4);
    }

    #[test]
    fn elapsed_counts_frames_not_samples() {
        let tap = MonitorTap::new(44_100, 10);
        // 4410 interleaved stereo samples = 2205 frames = 50 ms.
        tap.push_chunk(&[0.0; 4_410], 2);
        let snap = tap.snapshot();
        assert_eq!(snap.frames, 2_205);
        assert!((snap.elapsed_secs - 0.05).abs() < 1e-6);
    }

    #[test]
    fn clones_share_state() {
        let tap = MonitorTap::new(16_000, 10);
        let observer = tap.clone();
        tap.push_chunk(&[0.5; 160], 1);
        assert_eq!(observer.snapshot().frames, 160);
    }

    #[test]
    fn empty_chunk_ignored() {
        let tap = MonitorTap::new(16_000, 10);
        tap.push_chunk(&[], 1);
        let snap = tap.snapshot();
        assert!(snap.levels.is_empty());
        assert_eq!(snap.frames, 0);
    }
}
