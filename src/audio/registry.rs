//! Single-slot registry for the live capture context.
//!
//! The audio host allows one live capture context per process.  Instead of a
//! module-level mutable, ownership runs through an explicit registry:
//! opening a session acquires the slot, and acquiring while another context
//! is live force-releases the predecessor by firing its release channel.
//! The returned [`ContextGuard`] vacates the slot on drop, but only while it
//! is still the owner, so a superseded guard cannot evict its successor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, OnceLock};

use log::{debug, warn};

// ---------------------------------------------------------------------------
// ContextRegistry
// ---------------------------------------------------------------------------

struct ActiveSlot {
    id: u64,
    release: mpsc::Sender<()>,
}

/// Registry holding at most one live capture context.
///
/// The process-wide instance lives behind [`ContextRegistry::global`]; tests
/// construct their own with [`ContextRegistry::new`].
pub struct ContextRegistry {
    slot: Mutex<Option<ActiveSlot>>,
    next_id: AtomicU64,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Arc<ContextRegistry> {
        static GLOBAL: OnceLock<Arc<ContextRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ContextRegistry::new()))
    }

    /// Claim the slot for a new context.
    ///
    /// `release` is the new context's shutdown trigger; it is fired later if
    /// another acquisition supersedes this one.  Any context currently in
    /// the slot is force-released right now.
    pub fn acquire(self: &Arc<Self>, release: mpsc::Sender<()>) -> ContextGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.lock_slot();
        if let Some(previous) = slot.take() {
            warn!(
                "context registry: context {} still live, forcing release for context {id}",
                previous.id
            );
            // The predecessor may already be gone; a dead channel is fine.
            let _ = previous.release.send(());
        }
        *slot = Some(ActiveSlot { id, release });
        debug!("context registry: context {id} acquired");
        ContextGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Identifier of the context currently holding the slot.
    pub fn active_id(&self) -> Option<u64> {
        self.lock_slot().as_ref().map(|slot| slot.id)
    }

    pub fn is_occupied(&self) -> bool {
        self.active_id().is_some()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<ActiveSlot>> {
        match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn vacate(&self, id: u64) {
        let mut slot = self.lock_slot();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
            debug!("context registry: context {id} released");
        }
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ContextGuard
// ---------------------------------------------------------------------------

/// Owner token for the registry slot; releases it on drop.
pub struct ContextGuard {
    registry: Arc<ContextRegistry>,
    id: u64,
}

impl ContextGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.registry.vacate(self.id);
    }
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_occupies_and_drop_vacates() {
        let registry = Arc::new(ContextRegistry::new());
        let (tx, _rx) = mpsc::channel();

        let guard = registry.acquire(tx);
        assert!(registry.is_occupied());
        assert_eq!(registry.active_id(), Some(guard.id()));

        drop(guard);
        assert!(!registry.is_occupied());
    }

    #[test]
    fn second_acquire_forces_predecessor_release() {
        let registry = Arc::new(ContextRegistry::new());
        let (first_tx, first_rx) = mpsc::channel();
        let (second_tx, _second_rx) = mpsc::channel();

        let _first = registry.acquire(first_tx);
        let second = registry.acquire(second_tx);

        // The first context's release channel fired.
        assert!(first_rx.try_recv().is_ok());
        assert_eq!(registry.active_id(), Some(second.id()));
    }

    #[test]
    fn superseded_guard_does_not_evict_successor() {
        let registry = Arc::new(ContextRegistry::new());
        let (first_tx, _first_rx) = mpsc::channel();
        let (second_tx, _second_rx) = mpsc::channel();

        let first = registry.acquire(first_tx);
        let second = registry.acquire(second_tx);

        drop(first);
        assert_eq!(registry.active_id(), Some(second.id()));
    }

    #[test]
    fn ids_are_never_reused() {
        let registry = Arc::new(ContextRegistry::new());
        let mut seen = Vec::new();
        for _ in 0..5 {
            let (tx, _rx) = mpsc::channel();
            let guard = registry.acquire(tx);
            seen.push(guard.id());
        }
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(seen, deduped);
    }

    #[test]
    fn dead_release_channel_is_tolerated() {
        let registry = Arc::new(ContextRegistry::new());
        let (first_tx, first_rx) = mpsc::channel();
        drop(first_rx);
        let _first = registry.acquire(first_tx);

        let (second_tx, _second_rx) = mpsc::channel();
        let second = registry.acquire(second_tx);
        assert_eq!(registry.active_id(), Some(second.id()));
    }

    #[test]
    fn global_is_a_singleton() {
        let a = ContextRegistry::global();
        let b = ContextRegistry::global();
        assert!(Arc::ptr_eq(a, b));
    }
}
