use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Result type for job dispatch
pub type Result<T> = std::result::Result<T, Error>;

/// Why a wait ended without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut,
    Cancelled,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Errors returned by [`Dispatcher::run_job`](crate::Dispatcher::run_job)
///
/// A response whose type tag does not match the request is not represented
/// here: it means the transport misrouted a reply and the dispatcher panics.
#[derive(Error, Debug)]
pub enum Error {
    #[error("debug workspace error: {0}")]
    Workspace(String),

    #[error("failed to encode job request: {0}")]
    Encoding(#[source] CodecError),

    #[error("transport rejected job request: {0}")]
    Transport(#[from] TransportError),

    #[error("job request {0} before a response arrived")]
    TimedOutOrCancelled(Interrupted),

    #[error("failed to decode job response: {0}")]
    Decoding(#[source] CodecError),
}

impl Error {
    /// Whether the call was abandoned by timeout or cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::TimedOutOrCancelled(_))
    }
}
