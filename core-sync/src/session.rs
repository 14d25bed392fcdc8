//! Session epochs.
//!
//! Every login starts a new epoch and logout ends it. Work started under one
//! epoch holds a [`SessionGuard`] and checks it before applying a result, so
//! a response that lands after logout (or after the next login) is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of session epochs. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct SessionEpochs {
    current: Arc<AtomicU64>,
}

impl SessionEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch, invalidating every outstanding guard.
    pub fn begin(&self) -> SessionGuard {
        let epoch = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        SessionGuard {
            epoch,
            current: Arc::clone(&self.current),
        }
    }

    /// End the current epoch without starting a usable one.
    pub fn end(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Ties work to the epoch it was started in.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl SessionGuard {
    /// A guard with its own counter, current until the process drops it.
    pub fn detached() -> Self {
        SessionEpochs::new().begin()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}
