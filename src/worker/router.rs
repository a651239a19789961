//! Worker-side router dispatching envelopes to job handlers

use std::collections::HashMap;

use thiserror::Error;

use crate::codec::{Codec, CodecError, MessagePack};
use crate::job::{Envelope, Job};

/// Errors raised while dispatching an envelope on the worker side
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no handler for type tag {0:#x}")]
    UnknownTypeTag(u32),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Type-erased handler function
type ErasedHandler = Box<dyn Fn(&[u8]) -> Result<Vec<u8>, RouterError> + Send + Sync>;

type Fallback = Box<dyn Fn(Envelope) -> Envelope + Send + Sync>;

struct Route {
    name: String,
    handler: ErasedHandler,
}

/// Router that turns request envelopes into response envelopes
///
/// The router stores type-erased handlers internally, but registration is type-safe
/// via the [`Job`] trait. Responses are tagged with the request's type tag.
pub struct JobRouter<C: Codec = MessagePack> {
    codec: C,
    routes: HashMap<u32, Route>,
    fallback: Option<Fallback>,
}

impl JobRouter<MessagePack> {
    /// Create a new empty router using MessagePack payloads
    pub fn new() -> Self {
        Self::with_codec(MessagePack)
    }
}

impl<C: Codec + Clone + 'static> JobRouter<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            routes: HashMap::new(),
            fallback: None,
        }
    }

    /// Register a handler for a job type
    ///
    /// The job's type tag and name are obtained from `job`. The instance itself
    /// is only used to get those and infer the type.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let router = JobRouter::new()
    ///     .register(CompileShader::default(), |job| compile(job))
    ///     .register(PackTextures::default(), |job| pack(job));
    /// ```
    pub fn register<J, F>(mut self, job: J, handler: F) -> Self
    where
        J: Job,
        F: Fn(J) -> J::Response + Send + Sync + 'static,
    {
        let type_tag = job.type_tag();
        let name = job.name();
        let codec = self.codec.clone();

        let handler: ErasedHandler = Box::new(move |payload: &[u8]| {
            let job: J = codec.decode(payload)?;
            let response = handler(job);
            Ok(codec.encode(&response)?)
        });

        if let Some(previous) = self.routes.insert(type_tag, Route { name, handler }) {
            tracing::warn!(
                type_tag,
                replaced = %previous.name,
                "job handler registered twice for the same type tag"
            );
        }
        self
    }

    /// Handle envelopes whose type tag has no registered handler
    pub fn fallback<F>(mut self, handler: F) -> Self
    where
        F: Fn(Envelope) -> Envelope + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Produce the response envelope for a request envelope
    pub fn dispatch(&self, request: &Envelope) -> Result<Envelope, RouterError> {
        match self.routes.get(&request.type_tag) {
            Some(route) => {
                tracing::debug!(job = %route.name, type_tag = request.type_tag, "handling job");
                let payload = (route.handler)(&request.payload)?;
                Ok(Envelope::new(request.type_tag, payload))
            }
            None => match &self.fallback {
                Some(fallback) => Ok(fallback(request.clone())),
                None => Err(RouterError::UnknownTypeTag(request.type_tag)),
            },
        }
    }

    /// Registered type tags with their job names
    pub fn jobs(&self) -> impl Iterator<Item = (u32, &str)> {
        self.routes
            .iter()
            .map(|(tag, route)| (*tag, route.name.as_str()))
    }
}

impl Default for JobRouter<MessagePack> {
    fn default() -> Self {
        Self::new()
    }
}
