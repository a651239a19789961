//! Unix domain socket transport to an external worker process

use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::frame::{Frame, read_frame};
use crate::job::Envelope;
use crate::reply::ReplySender;
use crate::transport::{CorrelationId, Registry, Transport, TransportError};

/// Transport talking to a [`WorkerServer`](crate::worker::WorkerServer) over a Unix socket
///
/// A background thread reads response frames and routes them by correlation
/// id. When the worker closes the connection every pending registration is
/// dropped and further sends fail with [`TransportError::Closed`]; callers
/// already waiting resolve by timeout or cancellation.
pub struct SocketTransport {
    socket_path: PathBuf,
    writer: Mutex<UnixStream>,
    registry: Arc<Registry>,
    closed: Arc<AtomicBool>,
}

impl SocketTransport {
    /// Connect to a worker listening on `socket_path`
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&socket_path)?;
        let mut reader = stream.try_clone()?;

        let registry = Arc::new(Registry::new());
        let closed = Arc::new(AtomicBool::new(false));

        let reader_registry = Arc::clone(&registry);
        let reader_closed = Arc::clone(&closed);
        thread::Builder::new()
            .name("tether-socket-reader".to_string())
            .spawn(move || {
                loop {
                    match read_frame(&mut reader) {
                        Ok(Some(frame)) => {
                            let id = CorrelationId(frame.correlation);
                            if !reader_registry.complete(id, frame.envelope) {
                                tracing::debug!(%id, "dropping response for unknown or abandoned job");
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to read worker response");
                            break;
                        }
                    }
                }

                reader_closed.store(true, Ordering::SeqCst);
                let dropped = reader_registry.drain();
                if dropped > 0 {
                    tracing::warn!(dropped, "worker connection closed with jobs in flight");
                } else {
                    tracing::debug!("worker connection closed");
                }
            })?;

        tracing::info!(path = %socket_path.display(), "connected to worker");

        Ok(Self {
            socket_path,
            writer: Mutex::new(stream),
            registry,
            closed,
        })
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether the worker closed the connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for SocketTransport {
    fn send(&self, envelope: Envelope, reply: ReplySender) -> Result<CorrelationId, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let id = self.registry.register(reply);
        let written = Frame::new(id.0, envelope)
            .to_bytes()
            .map_err(TransportError::from)
            .and_then(|bytes| {
                let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
                writer.write_all(&bytes).map_err(TransportError::from)
            });

        if let Err(e) = written {
            self.registry.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    fn remove_handler(&self, id: CorrelationId) {
        if self.registry.remove(id) {
            tracing::debug!(%id, "removed pending job handler");
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        // Unblocks the reader thread
        if let Ok(writer) = self.writer.get_mut() {
            let _ = writer.shutdown(Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply;
    use crate::workspace::Workspace;
    use std::os::unix::net::UnixListener;
    use std::time::Duration;

    /// Accepts one connection and answers every frame with `respond`
    fn fake_worker(
        path: &Path,
        respond: impl Fn(Frame) -> Option<Frame> + Send + 'static,
    ) -> thread::JoinHandle<()> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = stream.try_clone().unwrap();
            while let Ok(Some(frame)) = read_frame(&mut reader) {
                if let Some(response) = respond(frame) {
                    stream.write_all(&response.to_bytes().unwrap()).unwrap();
                }
            }
        })
    }

    #[test]
    fn test_response_is_routed_by_correlation() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let path = dir.file("worker.sock");
        let worker = fake_worker(&path, Some);

        let transport = SocketTransport::connect(&path).unwrap();
        let (tx, rx) = reply::channel();
        transport.send(Envelope::new(3, vec![1, 2]), tx).unwrap();

        assert_eq!(
            rx.wait_timeout(Duration::from_secs(5)),
            Some(Envelope::new(3, vec![1, 2]))
        );

        drop(transport);
        worker.join().unwrap();
        std::fs::remove_file(&path).unwrap();
        dir.remove().unwrap();
    }

    #[test]
    fn test_worker_exit_closes_transport() {
        let dir = Workspace::random_in(std::env::temp_dir()).unwrap();
        let path = dir.file("worker.sock");
        // Answers nothing and hangs up after the first frame
        let listener = UnixListener::bind(&path).unwrap();
        let worker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_frame(&mut stream);
        });

        let transport = SocketTransport::connect(&path).unwrap();
        let (tx, rx) = reply::channel();
        transport.send(Envelope::new(3, vec![]), tx).unwrap();
        worker.join().unwrap();

        assert_eq!(rx.wait_timeout(Duration::from_millis(200)), None);
        for _ in 0..100 {
            if transport.is_closed() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(transport.is_closed());

        let (tx, _rx) = reply::channel();
        assert!(matches!(
            transport.send(Envelope::new(3, vec![]), tx),
            Err(TransportError::Closed)
        ));
        std::fs::remove_file(&path).unwrap();
        dir.remove().unwrap();
    }
}
