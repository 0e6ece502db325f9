//! Shared runtime configuration store.
//!
//! Patches are merged under a single write lock so readers never observe a
//! half-applied snapshot. The applied revision lives next to the snapshot
//! for the same reason.

use std::sync::{Arc, PoisonError, RwLock};

use crate::models::snapshot::{ConfigChange, ConfigPatch, ConfigSnapshot, Intervals};

#[derive(Debug, Default)]
struct StoreState {
    snapshot: ConfigSnapshot,
    revision: u64,
}

/// Cloneable handle to the worker's runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ConfigStore {
    /// Create a store seeded with `snapshot` at revision zero.
    #[must_use]
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                snapshot,
                revision: 0,
            })),
        }
    }

    /// Run `f` against the current snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&ConfigSnapshot) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard.snapshot)
    }

    /// Clone the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.read(Clone::clone)
    }

    /// Current cadences.
    #[must_use]
    pub fn intervals(&self) -> Intervals {
        self.read(|snapshot| snapshot.intervals)
    }

    /// Highest revision applied so far.
    #[must_use]
    pub fn applied_revision(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }

    /// Merge `patch` atomically. A carried revision only ever advances the
    /// applied revision.
    pub fn apply(&self, patch: &ConfigPatch) -> ConfigChange {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let change = guard.snapshot.apply(patch);
        if let Some(revision) = patch.revision {
            guard.revision = guard.revision.max(revision);
        }
        change
    }
}
