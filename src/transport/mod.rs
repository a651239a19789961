//! Transports that carry job envelopes to a worker
//!
//! A [`Transport`] accepts an envelope together with a [`ReplySender`] and
//! completes that sender at most once, from whatever thread it owns. The
//! returned [`CorrelationId`] identifies the pending registration until the
//! reply is consumed or [`Transport::remove_handler`] drops it.

mod local;
mod registry;
#[cfg(unix)]
mod socket;

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::frame::FrameError;
use crate::job::Envelope;
use crate::reply::ReplySender;

pub use local::LocalTransport;
pub use registry::Registry;
#[cfg(unix)]
pub use socket::SocketTransport;

/// Token identifying one pending reply registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised when a transport cannot accept an envelope
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("worker connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
}

/// Asynchronous, reply-slot based message transport
pub trait Transport: Send + Sync {
    /// Send an envelope and register `reply` to receive the response
    ///
    /// On error nothing stays registered.
    fn send(&self, envelope: Envelope, reply: ReplySender) -> Result<CorrelationId, TransportError>;

    /// Drop a pending registration
    ///
    /// Must be a silent no-op when the reply already fired or the handle was
    /// already removed.
    fn remove_handler(&self, id: CorrelationId);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, envelope: Envelope, reply: ReplySender) -> Result<CorrelationId, TransportError> {
        (**self).send(envelope, reply)
    }

    fn remove_handler(&self, id: CorrelationId) {
        (**self).remove_handler(id)
    }
}
