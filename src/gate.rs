//! Read-serialization gate.
//!
//! Reads open their own short-lived session, run display commands and close
//! it. Two of those lifecycles must never interleave, so every read path goes
//! through a [`ReadGate`]: one reader at a time, released when the reader's
//! future completes, fails or unwinds.
//!
//! The gate is a plain value. A [`crate::manager::ConfigManager`] holds one;
//! managers sharing a device should share a gate, either by cloning it or by
//! using [`ReadGate::global`].

use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

static GLOBAL_GATE: Lazy<ReadGate> = Lazy::new(ReadGate::new);

/// Mutual exclusion for read sessions. Clones share the same gate.
#[derive(Debug, Clone, Default)]
pub struct ReadGate {
    inner: Arc<Mutex<()>>,
}

/// Proof that the gate is held. Dropping it releases the gate.
#[derive(Debug)]
pub struct ReadGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ReadGate {
    /// A new, independent gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate.
    pub fn global() -> Self {
        GLOBAL_GATE.clone()
    }

    /// Wait for the gate and hold it until the guard is dropped.
    pub async fn acquire(&self) -> ReadGuard {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        trace!("Read gate acquired");
        ReadGuard { _guard: guard }
    }

    /// Run `f` while holding the gate. Not re-entrant: calling this again
    /// from inside `f` on the same gate deadlocks.
    pub async fn with_read_lock<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire().await;
        f().await
    }

    /// Whether some reader currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Whether two handles refer to the same gate.
    pub fn same_gate(&self, other: &ReadGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
