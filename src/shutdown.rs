//! Process-wide cancellation token.
//!
//! Workers check the token at the top of every loop iteration; the short
//! per-iteration sleeps and receive timeouts bound shutdown latency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable stop flag shared by every worker loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    stop: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent.
    pub fn trigger(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
