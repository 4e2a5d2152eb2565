use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues cancellation tokens; issuing or cancelling invalidates every token
/// handed out before.
///
/// Staleness is decided by generation comparison, never by completion order.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    generation: Arc<AtomicU64>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that stays live until the next `issue` or `cancel_all`.
    pub fn issue(&self) -> CancelToken {
        let issued = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        CancelToken {
            generation: Arc::clone(&self.generation),
            issued,
        }
    }

    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::Acquire) != self.issued
    }

    pub fn is_live(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn generation(&self) -> u64 {
        self.issued
    }
}
