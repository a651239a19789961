//! Correlation table shared by the bundled transports

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::job::Envelope;
use crate::reply::ReplySender;
use crate::transport::CorrelationId;

/// Pending replies keyed by correlation id
///
/// Removing an entry hands its sender out of the lock, so "complete" and
/// "remove" for the same id can never both succeed.
#[derive(Debug)]
pub struct Registry {
    next_id: AtomicU64,
    pending: Mutex<HashMap<CorrelationId, ReplySender>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<CorrelationId, ReplySender>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a reply sender under a fresh id
    pub fn register(&self, reply: ReplySender) -> CorrelationId {
        let id = CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending().insert(id, reply);
        id
    }

    /// Deliver a response to the registration `id`
    ///
    /// Returns `false` if the id is unknown (already removed or completed) or
    /// the waiting side already gave up.
    pub fn complete(&self, id: CorrelationId, envelope: Envelope) -> bool {
        let Some(reply) = self.pending().remove(&id) else {
            return false;
        };
        reply.send(envelope).is_ok()
    }

    /// Remove a registration; returns whether it was still pending
    pub fn remove(&self, id: CorrelationId) -> bool {
        self.pending().remove(&id).is_some()
    }

    /// Drop every pending registration, returning how many there were
    pub fn drain(&self) -> usize {
        let mut pending = self.pending();
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
