//! Blocking job dispatch over an asynchronous transport

use std::time::Duration;

use crate::cancel::CancelListener;
use crate::capture::DebugCapture;
use crate::codec::{Codec, MessagePack};
use crate::config::DispatcherConfig;
use crate::error::{Error, Interrupted, Result};
use crate::job::{Envelope, Job};
use crate::reply;
use crate::transport::Transport;
use crate::waiter::{WaitOutcome, Waiter};

/// Sends jobs to a worker and blocks until each one resolves
///
/// Every call resolves exactly once: by the worker's response, by the timeout,
/// or by the cancellation listener. A call that gives up deregisters its
/// pending reply from the transport before returning.
pub struct Dispatcher<T: Transport, C: Codec = MessagePack> {
    transport: T,
    codec: C,
    config: DispatcherConfig,
}

impl<T: Transport> Dispatcher<T> {
    /// Create a dispatcher with default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DispatcherConfig::default())
    }

    pub fn with_config(transport: T, config: DispatcherConfig) -> Self {
        Self::with_codec(transport, MessagePack, config)
    }
}

impl<T: Transport, C: Codec> Dispatcher<T, C> {
    pub fn with_codec(transport: T, codec: C, config: DispatcherConfig) -> Self {
        Self {
            transport,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run a job on the worker and wait for its response
    ///
    /// Blocks the calling thread for at most `timeout` (plus one poll
    /// interval). If the worker answers with a different type tag than the
    /// request, the transport misrouted a response and this panics.
    pub fn run_job<J: Job>(
        &self,
        job: &J,
        timeout: Duration,
        cancel: Option<&dyn CancelListener>,
    ) -> Result<J::Response> {
        let task = job.name();
        let type_tag = job.type_tag();

        let capture = if self.config.capture().enabled() {
            let capture = DebugCapture::create(self.config.capture(), job)
                .map_err(|e| failed(&task, None, e))?;
            Some(capture)
        } else {
            None
        };
        let capture_ref = capture.as_ref();

        let payload = self
            .codec
            .encode(job)
            .map_err(|e| failed(&task, capture_ref, Error::Encoding(e)))?;

        let (reply_tx, reply_rx) = reply::channel();

        tracing::info!(job = %task, type_tag, "sending job request to worker");
        let id = self
            .transport
            .send(Envelope::new(type_tag, payload), reply_tx)
            .map_err(|e| failed(&task, capture_ref, e.into()))?;

        let envelope = match Waiter::new(reply_rx, self.config.poll_interval()).wait(timeout, cancel)
        {
            WaitOutcome::Delivered(envelope) => envelope,
            WaitOutcome::TimedOut => {
                self.transport.remove_handler(id);
                let error = Error::TimedOutOrCancelled(Interrupted::TimedOut);
                return Err(failed(&task, capture_ref, error));
            }
            WaitOutcome::Cancelled => {
                self.transport.remove_handler(id);
                let error = Error::TimedOutOrCancelled(Interrupted::Cancelled);
                return Err(failed(&task, capture_ref, error));
            }
        };

        if envelope.type_tag != type_tag {
            tracing::error!(
                job = %task,
                %id,
                expected = type_tag,
                received = envelope.type_tag,
                "response type does not match request"
            );
            panic!(
                "response type tag {:#x} does not match request type tag {type_tag:#x} for job {task}",
                envelope.type_tag
            );
        }

        let response: J::Response = self
            .codec
            .decode(&envelope.payload)
            .map_err(|e| failed(&task, capture_ref, Error::Decoding(e)))?;

        tracing::info!(job = %task, %id, "job request completed");

        if let Some(capture) = capture_ref {
            if !self.config.capture().delete_on_success() {
                tracing::debug!(path = %capture.workspace().display(), "keeping job workspace");
            } else if !J::response_succeeded(&response) {
                tracing::info!(
                    path = %capture.workspace().display(),
                    "worker reported failure, keeping job workspace"
                );
            } else if let Err(e) = capture.cleanup() {
                tracing::warn!(error = %e, "failed to remove job workspace");
            }
        }

        Ok(response)
    }

    /// Like [`run_job`](Self::run_job), but moves the response into `response`
    ///
    /// `response` is only written when the call fully succeeds.
    pub fn run_job_into<J: Job>(
        &self,
        job: &J,
        response: &mut J::Response,
        timeout: Duration,
        cancel: Option<&dyn CancelListener>,
    ) -> Result<()> {
        *response = self.run_job(job, timeout, cancel)?;
        Ok(())
    }
}

/// Log a failed call and hand the error back
fn failed(task: &str, capture: Option<&DebugCapture>, error: Error) -> Error {
    match capture {
        Some(capture) => tracing::error!(
            job = %task,
            error = %error,
            workspace = %capture.workspace().display(),
            "job request failed, debug artifacts kept"
        ),
        None => tracing::error!(job = %task, error = %error, "job request failed"),
    }
    error
}
