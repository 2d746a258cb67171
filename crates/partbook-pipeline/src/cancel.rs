//! Cooperative cancellation for long-running operations.
//!
//! Whole-score detection checks the token between pages; per-page work is
//! not interruptible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, uncancelled token.
    #[inline]
    #[must_use = "constructors return a new instance"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; all clones observe it.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[inline]
    #[must_use = "returns the cancellation state"]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
