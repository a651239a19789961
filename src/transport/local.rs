//! In-process transport
//!
//! Runs each request through a [`JobRouter`] on its own thread and completes
//! the reply through a [`Registry`]. Useful for embedding a worker in the
//! same process and for exercising the dispatcher without sockets.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::codec::Codec;
use crate::job::Envelope;
use crate::reply::ReplySender;
use crate::transport::{CorrelationId, Registry, Transport, TransportError};
use crate::worker::JobRouter;

/// Transport delivering envelopes to an in-process [`JobRouter`]
pub struct LocalTransport<C: Codec = crate::codec::MessagePack> {
    router: Arc<JobRouter<C>>,
    registry: Arc<Registry>,
    latency: Duration,
}

impl<C: Codec + Clone + 'static> LocalTransport<C> {
    pub fn new(router: JobRouter<C>) -> Self {
        Self {
            router: Arc::new(router),
            registry: Arc::new(Registry::new()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every response by `latency`, simulating a remote worker
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of requests still waiting for a response
    pub fn pending(&self) -> usize {
        self.registry.len()
    }
}

impl<C: Codec + Clone + 'static> Transport for LocalTransport<C> {
    fn send(&self, envelope: Envelope, reply: ReplySender) -> Result<CorrelationId, TransportError> {
        let id = self.registry.register(reply);
        let router = Arc::clone(&self.router);
        let registry = Arc::clone(&self.registry);
        let latency = self.latency;

        let spawned = thread::Builder::new()
            .name(format!("tether-local-{}", id.0))
            .spawn(move || {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                match router.dispatch(&envelope) {
                    Ok(response) => {
                        if !registry.complete(id, response) {
                            tracing::debug!(%id, "dropping response for abandoned job");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, %id, "local worker failed to handle job");
                    }
                }
            });

        if let Err(e) = spawned {
            self.registry.remove(id);
            return Err(e.into());
        }
        Ok(id)
    }

    fn remove_handler(&self, id: CorrelationId) {
        if self.registry.remove(id) {
            tracing::debug!(%id, "removed pending job handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessagePack;
    use crate::reply;

    #[test]
    fn test_echo_through_local_transport() {
        let transport = LocalTransport::new(JobRouter::new().fallback(|envelope| envelope));
        let (tx, rx) = reply::channel();

        let id = transport.send(Envelope::new(1, vec![7]), tx).unwrap();
        assert_eq!(
            rx.wait_timeout(Duration::from_secs(5)),
            Some(Envelope::new(1, vec![7]))
        );
        // Already consumed, removal is a no-op
        transport.remove_handler(id);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn test_latency_delays_response() {
        let transport = LocalTransport::new(JobRouter::new().fallback(|envelope| envelope))
            .with_latency(Duration::from_millis(200));
        let (tx, rx) = reply::channel();

        transport.send(Envelope::new(2, vec![9]), tx).unwrap();
        assert_eq!(rx.wait_timeout(Duration::from_millis(50)), None);
        assert_eq!(transport.pending(), 1);
        assert_eq!(
            rx.wait_timeout(Duration::from_secs(5)),
            Some(Envelope::new(2, vec![9]))
        );
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn test_unknown_job_stays_pending_until_removed() {
        let transport: LocalTransport<MessagePack> = LocalTransport::new(JobRouter::new());
        let (tx, rx) = reply::channel();

        let id = transport.send(Envelope::new(1, vec![]), tx).unwrap();
        assert_eq!(rx.wait_timeout(Duration::from_millis(50)), None);
        assert_eq!(transport.pending(), 1);

        transport.remove_handler(id);
        transport.remove_handler(id);
        assert_eq!(transport.pending(), 0);
    }
}
