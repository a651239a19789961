//! Worker server implementation
//!
//! Unix domain socket server answering job frames sent by a
//! [`SocketTransport`](crate::transport::SocketTransport).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_net::unix::{UnixListener, UnixStream};
use executor_core::{Executor, Task};
use futures_lite::io::AsyncWriteExt;

use crate::codec::Codec;
use crate::frame::{Frame, read_frame_async};
use crate::transport::TransportError;
use crate::worker::router::JobRouter;

/// Worker server that listens on a Unix domain socket
pub struct WorkerServer {
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
}

impl WorkerServer {
    /// Create and start a new worker server
    ///
    /// # Arguments
    /// * `router` - The router producing responses for incoming jobs
    /// * `socket_path` - Path for the Unix domain socket
    /// * `executor` - Executor to spawn the server task on
    pub async fn new<C, E>(
        router: JobRouter<C>,
        socket_path: impl AsRef<Path>,
        executor: E,
    ) -> Result<Self, TransportError>
    where
        C: Codec + Clone + 'static,
        E: Executor + Clone + 'static,
    {
        let socket_path = socket_path.as_ref().to_path_buf();
        let router = Arc::new(router);
        let running = Arc::new(AtomicBool::new(true));

        // Remove a stale socket file from a previous run
        let _ = std::fs::remove_file(&socket_path);

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&socket_path)?;

        tracing::info!(path = %socket_path.display(), "worker server started");

        executor
            .spawn(run_server(
                listener,
                router,
                Arc::clone(&running),
                executor.clone(),
            ))
            .detach();

        Ok(Self {
            socket_path,
            running,
        })
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop accepting new connections
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(path = %self.socket_path.display(), "worker server stopping");
    }
}

impl Drop for WorkerServer {
    fn drop(&mut self) {
        self.stop();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Main server accept loop
async fn run_server<C, E>(
    listener: UnixListener,
    router: Arc<JobRouter<C>>,
    running: Arc<AtomicBool>,
    executor: E,
) where
    C: Codec + Clone + 'static,
    E: Executor + Clone + 'static,
{
    while running.load(Ordering::SeqCst) {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let router = Arc::clone(&router);
                executor
                    .spawn(handle_connection(stream, router, executor.clone()))
                    .detach();
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "failed to accept worker connection");
                }
            }
        }
    }
}

/// Handle a single connection
///
/// Every request is dispatched on its own task and runs on the blocking pool,
/// so a slow job never holds up the others multiplexed on the same stream.
/// A single writer sends responses back in completion order.
async fn handle_connection<C, E>(stream: UnixStream, router: Arc<JobRouter<C>>, executor: E)
where
    C: Codec + Clone + 'static,
    E: Executor + Clone + 'static,
{
    let (responses, outgoing) = async_channel::unbounded::<Frame>();
    executor.spawn(write_responses(stream.clone(), outgoing)).detach();

    let mut reader = stream;
    loop {
        let frame = match read_frame_async(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read job frame");
                break;
            }
        };

        let router = Arc::clone(&router);
        let responses = responses.clone();
        executor
            .spawn(async move {
                let correlation = frame.correlation;
                let type_tag = frame.envelope.type_tag;
                let result =
                    blocking::unblock(move || router.dispatch(&frame.envelope)).await;

                match result {
                    Ok(envelope) => {
                        // Fails only once the writer is gone
                        let _ = responses.send(Frame::new(correlation, envelope)).await;
                    }
                    Err(e) => {
                        // Left unanswered: the caller's wait resolves by timeout
                        tracing::warn!(error = %e, correlation, type_tag, "job handler error");
                    }
                }
            })
            .detach();
    }
}

/// Write responses to the connection until every sender is dropped
async fn write_responses(mut stream: UnixStream, outgoing: async_channel::Receiver<Frame>) {
    while let Ok(response) = outgoing.recv().await {
        let bytes = match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    correlation = response.correlation,
                    "failed to frame job response"
                );
                continue;
            }
        };

        if let Err(e) = stream.write_all(&bytes).await {
            tracing::debug!(error = %e, "failed to write job response");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::error::{Error, Interrupted};
    use crate::job::Job;
    use crate::transport::SocketTransport;
    use crate::workspace::Workspace;
    use executor_core::tokio::TokioGlobal;
    use serde::{Deserialize, Serialize};
    use std::time::{Duration, Instant};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Shout {
        text: String,
    }

    impl Job for Shout {
        type Response = String;

        fn type_tag(&self) -> u32 {
            0x53
        }

        fn name(&self) -> String {
            "shout".to_string()
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Whisper {
        text: String,
    }

    impl Job for Whisper {
        type Response = String;

        fn type_tag(&self) -> u32 {
            0x57
        }

        fn name(&self) -> String {
            "whisper".to_string()
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Nap {
        millis: u64,
    }

    impl Job for Nap {
        type Response = u64;

        fn type_tag(&self) -> u32 {
            0x4e
        }

        fn name(&self) -> String {
            "nap".to_string()
        }
    }

    async fn start(dir: &Workspace) -> WorkerServer {
        let router = JobRouter::new().register(Shout::default(), |job: Shout| {
            job.text.to_uppercase()
        });
        WorkerServer::new(router, dir.file("worker.sock"), TokioGlobal)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatch_over_socket() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let server = start(&dir).await;
        let socket = server.socket_path().to_path_buf();

        let responses = tokio::task::spawn_blocking(move || -> Result<Vec<String>, Error> {
            let dispatcher = Dispatcher::new(SocketTransport::connect(&socket)?);
            std::thread::scope(|scope| {
                let handles: Vec<_> = ["one", "two", "three"]
                    .into_iter()
                    .map(|text| {
                        let dispatcher = &dispatcher;
                        scope.spawn(move || {
                            let job = Shout {
                                text: text.to_string(),
                            };
                            dispatcher.run_job(&job, Duration::from_secs(5), None)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .collect::<Result<Vec<_>, Error>>()
            })
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(responses, vec!["ONE", "TWO", "THREE"]);
        drop(server);
        dir.remove().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_job_does_not_block_connection() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let router = JobRouter::new()
            .register(Shout::default(), |job: Shout| job.text.to_uppercase())
            .register(Nap::default(), |job: Nap| {
                std::thread::sleep(Duration::from_millis(job.millis));
                job.millis
            });
        let server = WorkerServer::new(router, dir.file("worker.sock"), TokioGlobal)
            .await
            .unwrap();
        let socket = server.socket_path().to_path_buf();

        let (slow, fast, fast_elapsed) = tokio::task::spawn_blocking(move || {
            let dispatcher = Dispatcher::new(SocketTransport::connect(&socket).unwrap());
            std::thread::scope(|scope| {
                let slow = scope.spawn(|| {
                    dispatcher.run_job(&Nap { millis: 1500 }, Duration::from_secs(5), None)
                });
                std::thread::sleep(Duration::from_millis(100));

                let started = Instant::now();
                let job = Shout {
                    text: "quick".to_string(),
                };
                let fast = dispatcher.run_job(&job, Duration::from_millis(1000), None);
                let fast_elapsed = started.elapsed();
                (slow.join().unwrap(), fast, fast_elapsed)
            })
        })
        .await
        .unwrap();

        assert_eq!(slow.unwrap(), 1500);
        assert_eq!(fast.unwrap(), "QUICK");
        assert!(fast_elapsed < Duration::from_millis(1000), "{fast_elapsed:?}");
        drop(server);
        dir.remove().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unhandled_job_times_out() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let server = start(&dir).await;
        let socket = server.socket_path().to_path_buf();

        let result = tokio::task::spawn_blocking(move || -> Result<String, Error> {
            let dispatcher = Dispatcher::new(SocketTransport::connect(&socket)?);
            let job = Whisper {
                text: "psst".to_string(),
            };
            dispatcher.run_job(&job, Duration::from_millis(300), None)
        })
        .await
        .unwrap();

        assert!(matches!(
            result,
            Err(Error::TimedOutOrCancelled(Interrupted::TimedOut))
        ));
        drop(server);
        dir.remove().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_removes_socket_file() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let server = start(&dir).await;
        let socket = server.socket_path().to_path_buf();
        assert!(socket.exists());

        drop(server);
        assert!(!socket.exists());
        dir.remove().unwrap();
    }
}
