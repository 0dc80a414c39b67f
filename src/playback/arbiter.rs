//! Single-flight playback arbitration.
//!
//! One clip plays at a time.  [`PlaybackArbiter::play`] silences whatever
//! is playing before it even resolves the next handle, so a failed resolve
//! or decode still leaves the previous clip stopped.
//!
//! Replay restarts the clip that last played from its decoded samples and
//! does not touch the store, matching download-once semantics: a clip that
//! already played keeps replaying even after its handle is revoked, while
//! a fresh `play` of that handle fails deterministically.

use thiserror::Error;

use crate::convert::{ResultVariant, SharedVariantStore, StoreError, VariantHandle};
use crate::playback::decode::{decode_media, DecodeError, DecodedAudio};
use crate::playback::sink::{AudioSink, SinkError};

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors that can occur starting playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The variant's handle is no longer resolvable.
    #[error("variant unavailable: {0}")]
    Unavailable(#[from] StoreError),

    /// The payload could not be decoded.
    #[error("payload undecodable: {0}")]
    Media(#[from] DecodeError),

    /// The output device failed.
    #[error("output failed: {0}")]
    Sink(#[from] SinkError),
}

// ---------------------------------------------------------------------------
// PlaybackArbiter
// ---------------------------------------------------------------------------

struct CurrentClip {
    handle: VariantHandle,
    audio: DecodedAudio,
}

/// Owns the sink and enforces one-clip-at-a-time playback.
///
/// Not `Send`; lives on the thread that drives the sink.
pub struct PlaybackArbiter<S: AudioSink> {
    store: SharedVariantStore,
    sink: S,
    current: Option<CurrentClip>,
}

impl<S: AudioSink> PlaybackArbiter<S> {
    pub fn new(store: SharedVariantStore, sink: S) -> Self {
        Self {
            store,
            sink,
            current: None,
        }
    }

    /// Play `variant` from the top, replacing any current clip.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Unavailable`] when the handle was revoked,
    /// [`PlaybackError::Media`] when the payload does not decode,
    /// [`PlaybackError::Sink`] when the device refuses the clip.  The
    /// previous clip is silenced in every one of these cases.
    pub fn play(&mut self, variant: &ResultVariant) -> Result<(), PlaybackError> {
        // Silence first: even a failed play must not leave the old clip
        // running underneath an error message.
        self.sink.silence();
        self.current = None;

        let payload = {
            let store = match self.store.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            store.resolve(variant.handle)?
        };

        let audio = decode_media(payload.as_ref().clone(), Some(variant.format.as_str()))?;
        self.sink.begin(audio.clone())?;
        self.current = Some(CurrentClip {
            handle: variant.handle,
            audio,
        });
        Ok(())
    }

    /// Restart the last-played clip from the top.
    ///
    /// Returns `false` when nothing has played yet.  Uses the decoded
    /// samples kept from `play`, so it works even after the handle was
    /// revoked.
    pub fn replay(&mut self) -> Result<bool, PlaybackError> {
        match &self.current {
            Some(clip) => {
                let audio = clip.audio.clone();
                self.sink.begin(audio)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop playback and forget the current clip.
    pub fn stop(&mut self) {
        self.sink.silence();
        self.current = None;
    }

    /// Stop only if `handle` is the clip being played.  A variant dropped
    /// from the results list takes its audio with it; unrelated playback
    /// is left alone.
    pub fn dismiss(&mut self, handle: VariantHandle) -> bool {
        match &self.current {
            Some(clip) if clip.handle == handle => {
                self.stop();
                true
            }
            _ => false,
        }
    }

    /// True while the sink is still voicing a clip.
    pub fn is_playing(&self) -> bool {
        self.current.is_some() && self.sink.is_active()
    }

    /// Handle of the clip that last played, if any.
    pub fn current_handle(&self) -> Option<VariantHandle> {
        self.current.as_ref().map(|clip| clip.handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::audio::SampleBuffer;
    use crate::convert::{new_shared_store, BitDepth, VariantFormat};
    use crate::wav::encode;

    // ---- MockSink ----------------------------------------------------------

    #[derive(Default)]
    struct MockState {
        begun_frames: Vec<usize>,
        silences: usize,
        active: bool,
        fail_begin: bool,
    }

    #[derive(Clone, Default)]
    struct MockSink {
        state: Arc<Mutex<MockState>>,
    }

    impl AudioSink for MockSink {
        fn begin(&mut self, audio: DecodedAudio) -> Result<(), SinkError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_begin {
                return Err(SinkError::NoOutputDevice);
            }
            state.begun_frames.push(audio.frames());
            state.active = true;
            Ok(())
        }

        fn silence(&mut self) {
            let mut state = self.state.lock().unwrap();
            state.silences += 1;
            state.active = false;
        }

        fn is_active(&self) -> bool {
            self.state.lock().unwrap().active
        }
    }

    // ---- Fixtures ----------------------------------------------------------

    fn wav_payload(frames: usize) -> Vec<u8> {
        let buffer = SampleBuffer::new(8_000, vec![vec![0.25; frames]]).unwrap();
        encode(&buffer).unwrap().into_bytes()
    }

    fn publish_variant(store: &SharedVariantStore, frames: usize) -> ResultVariant {
        publish_payload(store, wav_payload(frames))
    }

    fn publish_payload(store: &SharedVariantStore, payload: Vec<u8>) -> ResultVariant {
        let size_bytes = payload.len();
        let handle = store.lock().unwrap().publish(payload);
        ResultVariant {
            format: VariantFormat::Wav,
            bit_depth: BitDepth::Sixteen,
            mime_type: "audio/wav".into(),
            size_bytes,
            handle,
        }
    }

    fn arbiter_with_probe() -> (PlaybackArbiter<MockSink>, SharedVariantStore, MockSink) {
        let store = new_shared_store();
        let sink = MockSink::default();
        let probe = sink.clone();
        (PlaybackArbiter::new(store.clone(), sink), store, probe)
    }

    // ---- Tests -------------------------------------------------------------

    #[test]
    fn play_decodes_and_begins() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let variant = publish_variant(&store, 32);

        arbiter.play(&variant).unwrap();

        let state = probe.state.lock().unwrap();
        assert_eq!(state.begun_frames, vec![32]);
        assert_eq!(state.silences, 1);
        drop(state);
        assert!(arbiter.is_playing());
        assert_eq!(arbiter.current_handle(), Some(variant.handle));
    }

    #[test]
    fn play_replaces_the_previous_clip() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let first = publish_variant(&store, 16);
        let second = publish_variant(&store, 32);

        arbiter.play(&first).unwrap();
        arbiter.play(&second).unwrap();

        let state = probe.state.lock().unwrap();
        assert_eq!(state.begun_frames, vec![16, 32]);
        assert_eq!(state.silences, 2);
        assert!(state.active);
        drop(state);
        assert_eq!(arbiter.current_handle(), Some(second.handle));
    }

    #[test]
    fn play_silences_previous_even_when_resolve_fails() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let first = publish_variant(&store, 16);
        let second = publish_variant(&store, 16);

        arbiter.play(&first).unwrap();
        store.lock().unwrap().revoke(second.handle);

        let err = arbiter.play(&second).unwrap_err();
        assert!(matches!(err, PlaybackError::Unavailable(_)));

        let state = probe.state.lock().unwrap();
        assert_eq!(state.begun_frames.len(), 1);
        assert!(!state.active);
        drop(state);
        assert!(!arbiter.is_playing());
        assert_eq!(arbiter.current_handle(), None);
    }

    #[test]
    fn play_of_revoked_handle_fails_every_time() {
        let (mut arbiter, store, _probe) = arbiter_with_probe();
        let variant = publish_variant(&store, 16);
        store.lock().unwrap().revoke(variant.handle);

        for _ in 0..3 {
            assert!(matches!(
                arbiter.play(&variant),
                Err(PlaybackError::Unavailable(_))
            ));
        }
    }

    #[test]
    fn play_of_undecodable_payload_reports_media_error() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let variant = publish_payload(&store, b"not audio at all".to_vec());

        let err = arbiter.play(&variant).unwrap_err();
        assert!(matches!(err, PlaybackError::Media(_)));
        assert!(probe.state.lock().unwrap().begun_frames.is_empty());
    }

    #[test]
    fn replay_restarts_from_cached_samples() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let variant = publish_variant(&store, 24);

        arbiter.play(&variant).unwrap();
        // Revoking after a play must not break replay.
        store.lock().unwrap().revoke(variant.handle);

        assert!(arbiter.replay().unwrap());
        assert_eq!(probe.state.lock().unwrap().begun_frames, vec![24, 24]);
    }

    #[test]
    fn replay_without_a_clip_is_a_noop() {
        let (mut arbiter, _store, probe) = arbiter_with_probe();
        assert!(!arbiter.replay().unwrap());
        assert!(probe.state.lock().unwrap().begun_frames.is_empty());
    }

    #[test]
    fn stop_silences_and_forgets() {
        let (mut arbiter, store, _probe) = arbiter_with_probe();
        let variant = publish_variant(&store, 16);

        arbiter.play(&variant).unwrap();
        arbiter.stop();

        assert!(!arbiter.is_playing());
        assert_eq!(arbiter.current_handle(), None);
        assert!(!arbiter.replay().unwrap());
    }

    #[test]
    fn dismiss_only_matches_the_playing_handle() {
        let (mut arbiter, store, _probe) = arbiter_with_probe();
        let playing = publish_variant(&store, 16);
        let other = publish_variant(&store, 16);

        arbiter.play(&playing).unwrap();

        assert!(!arbiter.dismiss(other.handle));
        assert!(arbiter.is_playing());

        assert!(arbiter.dismiss(playing.handle));
        assert!(!arbiter.is_playing());
    }

    #[test]
    fn sink_failure_surfaces_and_clears_current() {
        let (mut arbiter, store, probe) = arbiter_with_probe();
        let variant = publish_variant(&store, 16);
        probe.state.lock().unwrap().fail_begin = true;

        let err = arbiter.play(&variant).unwrap_err();
        assert!(matches!(err, PlaybackError::Sink(_)));
        assert_eq!(arbiter.current_handle(), None);
    }
}
