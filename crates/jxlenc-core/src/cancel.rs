//! Cooperative cancellation of in-flight encodes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token the caller can use to cancel an encode
///
/// The encoder checks the token at logical boundaries (frames, passes,
/// block groups) and bails out with `Error::Cancelled`. Partial output is
/// undefined and must be discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; safe to call from another thread
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
