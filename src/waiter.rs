//! Blocking wait on a reply slot with timeout and cancellation

use std::time::{Duration, Instant};

use crate::cancel::CancelListener;
use crate::error::Interrupted;
use crate::job::Envelope;
use crate::reply::ReplyReceiver;

/// How often the cancellation predicate is polled while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a wait ended
#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Delivered(Envelope),
    TimedOut,
    Cancelled,
}

impl From<Interrupted> for WaitOutcome {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::TimedOut => Self::TimedOut,
            Interrupted::Cancelled => Self::Cancelled,
        }
    }
}

/// Blocks the calling thread until a reply arrives, the timeout elapses, or
/// the cancellation listener fires
///
/// When the waiter gives up it closes the reply slot before returning, so a
/// reply that arrives afterwards is rejected by the slot rather than stored.
/// A reply that lands while the slot is being closed still wins.
#[derive(Debug)]
pub struct Waiter {
    reply: ReplyReceiver,
    poll_interval: Duration,
}

impl Waiter {
    pub fn new(reply: ReplyReceiver, poll_interval: Duration) -> Self {
        Self {
            reply,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn wait(self, timeout: Duration, cancel: Option<&dyn CancelListener>) -> WaitOutcome {
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            let interrupted = if cancel.is_some_and(|c| c.is_cancelled()) {
                Some(Interrupted::Cancelled)
            } else if elapsed >= timeout {
                Some(Interrupted::TimedOut)
            } else {
                None
            };

            if let Some(reason) = interrupted {
                return match self.reply.close() {
                    Some(envelope) => WaitOutcome::Delivered(envelope),
                    None => {
                        tracing::debug!(%reason, ?elapsed, "stopped waiting for job response");
                        reason.into()
                    }
                };
            }

            let slice = self.poll_interval.min(timeout - elapsed);
            if let Some(envelope) = self.reply.wait_timeout(slice) {
                return WaitOutcome::Delivered(envelope);
            }
        }
    }
}
