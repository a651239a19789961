//! Worker side of the bridge
//!
//! A worker process hosts a [`JobRouter`] and answers each request envelope
//! with a response envelope carrying the same type tag. [`WorkerServer`]
//! exposes a router over a Unix domain socket.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether::worker::{JobRouter, WorkerServer};
//!
//! let router = JobRouter::new()
//!     .register(CompileShader::default(), |job| compile(&job.source));
//!
//! let server = WorkerServer::new(router, "/tmp/shader-worker.sock", executor).await?;
//! ```

mod router;
#[cfg(unix)]
mod server;

pub use router::{JobRouter, RouterError};
#[cfg(unix)]
pub use server::WorkerServer;
