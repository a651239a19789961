//! Consume-once reply slot
//!
//! A transport completes a pending request through a [`ReplySender`]; the
//! blocked caller waits on the matching [`ReplyReceiver`]. Completion and
//! closure are serialized by the slot lock, so exactly one of them wins:
//! once the receiver closes the slot, a late reply is handed back to the
//! transport instead of being stored.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::job::Envelope;

#[derive(Debug)]
enum Slot {
    Pending,
    Delivered(Envelope),
    Taken,
    Closed,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected sender/receiver pair
pub fn channel() -> (ReplySender, ReplyReceiver) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    (
        ReplySender {
            shared: Arc::clone(&shared),
        },
        ReplyReceiver { shared },
    )
}

/// Transport-side half of a reply slot
#[derive(Debug)]
pub struct ReplySender {
    shared: Arc<Shared>,
}

impl ReplySender {
    /// Complete the reply
    ///
    /// Returns the envelope back if the receiver already gave up or a reply
    /// was already delivered.
    pub fn send(self, envelope: Envelope) -> Result<(), Envelope> {
        let mut slot = self.shared.lock();
        if !matches!(*slot, Slot::Pending) {
            return Err(envelope);
        }
        *slot = Slot::Delivered(envelope);
        self.shared.ready.notify_all();
        Ok(())
    }

    /// Whether the receiver stopped waiting
    pub fn is_closed(&self) -> bool {
        matches!(*self.shared.lock(), Slot::Closed)
    }
}

/// Caller-side half of a reply slot
#[derive(Debug)]
pub struct ReplyReceiver {
    shared: Arc<Shared>,
}

impl ReplyReceiver {
    /// Wait up to `timeout` for the reply and take it if it arrived
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<Envelope> {
        let slot = self.shared.lock();
        let (mut slot, _) = self
            .shared
            .ready
            .wait_timeout_while(slot, timeout, |slot| matches!(slot, Slot::Pending))
            .unwrap_or_else(PoisonError::into_inner);

        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Delivered(envelope) => Some(envelope),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Close the slot so later replies are rejected
    ///
    /// Returns the reply if it was delivered before the slot closed.
    pub(crate) fn close(&self) -> Option<Envelope> {
        match std::mem::replace(&mut *self.shared.lock(), Slot::Closed) {
            Slot::Delivered(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl Drop for ReplyReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn envelope(tag: u32) -> Envelope {
        Envelope::new(tag, vec![tag as u8])
    }

    #[test]
    fn test_reply_before_wait() {
        let (tx, rx) = channel();
        tx.send(envelope(1)).unwrap();
        assert_eq!(rx.wait_timeout(Duration::ZERO), Some(envelope(1)));
    }

    #[test]
    fn test_reply_from_other_thread_wakes_waiter() {
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(envelope(2)).unwrap();
        });
        let start = Instant::now();
        assert_eq!(rx.wait_timeout(Duration::from_secs(5)), Some(envelope(2)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_without_reply() {
        let (_tx, rx) = channel();
        assert_eq!(rx.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_closed_slot_rejects_reply() {
        let (tx, rx) = channel();
        assert_eq!(rx.close(), None);
        assert!(tx.is_closed());
        assert_eq!(tx.send(envelope(3)), Err(envelope(3)));
    }

    #[test]
    fn test_close_returns_reply_that_won_the_race() {
        let (tx, rx) = channel();
        tx.send(envelope(4)).unwrap();
        assert_eq!(rx.close(), Some(envelope(4)));
    }

    #[test]
    fn test_dropped_receiver_rejects_reply() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(tx.send(envelope(5)).is_err());
    }
}
