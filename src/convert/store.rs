//! Epoch-scoped byte store behind the published variants.
//!
//! Conversion payloads are large, so descriptors never carry them; they
//! carry a [`VariantHandle`] into this store instead.  A new submission
//! starts a new epoch with [`VariantStore::begin_epoch`], atomically
//! revoking every handle from the previous result set — resolving a stale
//! handle afterwards fails deterministically rather than replaying old
//! audio.  Handles are unique for the lifetime of the store and are never
//! reused across epochs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;

// ---------------------------------------------------------------------------
// VariantHandle
// ---------------------------------------------------------------------------

/// Opaque identity of one published payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantHandle(u64);

impl VariantHandle {
    /// Wrap a raw identifier; handles normally come from
    /// [`VariantStore::publish`].
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for VariantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Resolution failure: the handle's payload is gone.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("variant {0} has been revoked")]
    Revoked(VariantHandle),
}

// ---------------------------------------------------------------------------
// VariantStore
// ---------------------------------------------------------------------------

/// Registry of published payloads for the current result epoch.
pub struct VariantStore {
    next: u64,
    epoch: u64,
    entries: HashMap<u64, Arc<Vec<u8>>>,
}

/// The store as shared by the submission client, the orchestrator and the
/// playback arbiter.
pub type SharedVariantStore = Arc<Mutex<VariantStore>>;

/// Create a fresh store behind the usual `Arc<Mutex<…>>`.
pub fn new_shared_store() -> SharedVariantStore {
    Arc::new(Mutex::new(VariantStore::new()))
}

impl VariantStore {
    pub fn new() -> Self {
        Self {
            next: 1,
            epoch: 1,
            entries: HashMap::new(),
        }
    }

    /// Publish a payload and mint its handle.
    pub fn publish(&mut self, bytes: Vec<u8>) -> VariantHandle {
        let handle = VariantHandle(self.next);
        self.next += 1;
        self.entries.insert(handle.0, Arc::new(bytes));
        handle
    }

    /// Look a handle up.
    ///
    /// # Errors
    ///
    /// [`StoreError::Revoked`] once the handle's epoch has ended (or for a
    /// handle this store never issued).
    pub fn resolve(&self, handle: VariantHandle) -> Result<Arc<Vec<u8>>, StoreError> {
        self.entries
            .get(&handle.0)
            .cloned()
            .ok_or(StoreError::Revoked(handle))
    }

    /// Revoke a single handle.  Returns whether it was still live.
    pub fn revoke(&mut self, handle: VariantHandle) -> bool {
        self.entries.remove(&handle.0).is_some()
    }

    /// End the current epoch: every live handle is revoked in one step and
    /// the epoch counter advances.  Returns how many payloads were released.
    pub fn begin_epoch(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        self.epoch += 1;
        if released > 0 {
            log::debug!("store: epoch {} begins, {released} payloads released", self.epoch);
        }
        released
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of live payloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for VariantStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_resolve() {
        let mut store = VariantStore::new();
        let handle = store.publish(vec![1, 2, 3]);
        assert_eq!(store.resolve(handle).unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolve_after_revoke_fails_deterministically() {
        let mut store = VariantStore::new();
        let handle = store.publish(vec![9; 16]);
        assert!(store.revoke(handle));

        for _ in 0..3 {
            assert_eq!(store.resolve(handle), Err(StoreError::Revoked(handle)));
        }
    }

    #[test]
    fn revoke_twice_reports_already_gone() {
        let mut store = VariantStore::new();
        let handle = store.publish(vec![1]);
        assert!(store.revoke(handle));
        assert!(!store.revoke(handle));
    }

    #[test]
    fn begin_epoch_revokes_everything_at_once() {
        let mut store = VariantStore::new();
        let a = store.publish(vec![1]);
        let b = store.publish(vec![2]);
        let c = store.publish(vec![3]);

        assert_eq!(store.begin_epoch(), 3);
        assert!(store.is_empty());
        for handle in [a, b, c] {
            assert_eq!(store.resolve(handle), Err(StoreError::Revoked(handle)));
        }
    }

    #[test]
    fn epoch_counter_advances() {
        let mut store = VariantStore::new();
        assert_eq!(store.epoch(), 1);
        store.begin_epoch();
        assert_eq!(store.epoch(), 2);
        store.begin_epoch();
        assert_eq!(store.epoch(), 3);
    }

    #[test]
    fn handles_never_reused_across_epochs() {
        let mut store = VariantStore::new();
        let first = store.publish(vec![1]);
        store.begin_epoch();
        let second = store.publish(vec![2]);

        assert_ne!(first, second);
        // The old handle stays dead even though a new epoch is live.
        assert_eq!(store.resolve(first), Err(StoreError::Revoked(first)));
        assert!(store.resolve(second).is_ok());
    }

    #[test]
    fn resolving_a_foreign_handle_fails() {
        let store = VariantStore::new();
        let foreign = VariantHandle::from_raw(999);
        assert_eq!(store.resolve(foreign), Err(StoreError::Revoked(foreign)));
    }

    #[test]
    fn payloads_survive_while_resolved() {
        let mut store = VariantStore::new();
        let handle = store.publish(vec![7; 4]);
        let held = store.resolve(handle).unwrap();

        store.begin_epoch();
        // The Arc keeps the bytes alive for anyone already holding them,
        // but the handle itself is dead.
        assert_eq!(held.as_slice(), &[7; 4]);
        assert_eq!(store.resolve(handle), Err(StoreError::Revoked(handle)));
    }
}
