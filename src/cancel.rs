//! Cooperative cancellation
//!
//! Cancellation is a condition, not an event: the waiter polls
//! [`CancelListener::is_cancelled`] between short waits. The worker is never
//! interrupted, only the caller's wait is abandoned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A polled cancellation predicate
///
/// Implementations must be non-blocking and idempotent.
pub trait CancelListener: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancelListener for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: CancelListener + ?Sized> CancelListener for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// A cloneable cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl CancelListener for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
