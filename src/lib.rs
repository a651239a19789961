//! Tether - blocking job dispatch over asynchronous worker transports
//!
//! This library lets a plain synchronous call site hand a job to an external
//! worker and block until exactly one of three things happens:
//! - the worker's response arrives
//! - the timeout elapses
//! - a cancellation listener fires
//!
//! A call that gives up always deregisters its pending reply, and the reply
//! slot it waited on rejects anything delivered afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tether::{CancelFlag, Dispatcher, SocketTransport};
//!
//! fn compile(shader: &CompileShader) -> tether::Result<CompiledShader> {
//!     let transport = SocketTransport::connect("/tmp/shader-worker.sock")?;
//!     let dispatcher = Dispatcher::new(transport);
//!
//!     let cancel = CancelFlag::new();
//!     dispatcher.run_job(shader, Duration::from_secs(30), Some(&cancel))
//! }
//! ```
//!
//! # Debug Capture
//!
//! With capture enabled, each request is written to its own workspace before
//! it is sent, and a command line replaying it is logged:
//!
//! ```rust,ignore
//! use tether::{DebugCaptureConfig, Dispatcher, DispatcherConfig};
//!
//! let config = DispatcherConfig::builder()
//!     .capture(
//!         DebugCaptureConfig::builder()
//!             .enabled(true)
//!             .delete_on_success(true)
//!             .build(),
//!     )
//!     .build();
//! let dispatcher = Dispatcher::with_config(transport, config);
//! ```

mod cancel;
mod capture;
pub mod codec;
mod config;
mod dispatcher;
mod error;
pub mod frame;
mod job;
pub mod reply;
pub mod transport;
mod waiter;
pub mod worker;
mod workspace;

// Re-export public types
pub use cancel::{CancelFlag, CancelListener};
pub use capture::{DebugCapture, REQUEST_FILE, RESPONSE_FILE};
pub use codec::{Codec, CodecError, Json, MessagePack};
pub use config::{
    DEFAULT_REPLAY_PROGRAM, DEFAULT_TIMEOUT, DebugCaptureConfig, DebugCaptureConfigBuilder,
    DispatcherConfig, DispatcherConfigBuilder,
};
pub use dispatcher::Dispatcher;
pub use error::{Error, Interrupted, Result};
pub use job::{Envelope, Job};
#[cfg(unix)]
pub use transport::SocketTransport;
pub use transport::{CorrelationId, LocalTransport, Transport, TransportError};
pub use waiter::{DEFAULT_POLL_INTERVAL, WaitOutcome, Waiter};
#[cfg(unix)]
pub use worker::WorkerServer;
pub use worker::{JobRouter, RouterError};
pub use workspace::Workspace;
