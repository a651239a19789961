//! Job definitions and the envelope that carries them
//!
//! # Example
//!
//! ```rust,ignore
//! use serde::{Deserialize, Serialize};
//! use tether::Job;
//!
//! #[derive(Serialize, Deserialize)]
//! struct CompileShader { source: String }
//!
//! #[derive(Serialize, Deserialize)]
//! struct CompiledShader { ok: bool, bytecode: Vec<u8> }
//!
//! impl Job for CompileShader {
//!     type Response = CompiledShader;
//!
//!     fn type_tag(&self) -> u32 { 0x5348_4452 }
//!
//!     fn name(&self) -> String { "compile_shader".to_string() }
//!
//!     fn response_succeeded(response: &CompiledShader) -> bool { response.ok }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};

/// A type tag plus an encoded payload, exchanged over a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub type_tag: u32,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(type_tag: u32, payload: Vec<u8>) -> Self {
        Self { type_tag, payload }
    }
}

/// A request that can be dispatched to a worker
///
/// The worker answers with [`Job::Response`] under the same type tag.
pub trait Job: Serialize + DeserializeOwned + Send + 'static {
    /// The response type produced by the worker
    type Response: Serialize + DeserializeOwned + Send + 'static;

    /// Tag identifying this request/response pair on the wire
    fn type_tag(&self) -> u32;

    /// Human readable task name for logs and the reproduction line
    fn name(&self) -> String;

    /// Whether the worker reported success in its response
    ///
    /// Debug artifacts of jobs the worker reported as failed are kept even
    /// when successful artifacts are deleted.
    fn response_succeeded(_response: &Self::Response) -> bool {
        true
    }
}
