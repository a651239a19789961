use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::waiter::DEFAULT_POLL_INTERVAL;

/// Default time budget for a job when the caller has no better estimate
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Program named in the reproduction line of captured jobs
pub const DEFAULT_REPLAY_PROGRAM: &str = "tether";

/// Debug capture settings
///
/// When enabled, every job request is written to its own workspace before it
/// is sent so the call can be replayed by hand.
#[derive(Debug, Clone)]
pub struct DebugCaptureConfig {
    enabled: bool,
    delete_on_success: bool,
    root: PathBuf,
    replay_program: String,
    replay_socket: Option<PathBuf>,
}

impl Default for DebugCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delete_on_success: true,
            root: std::env::temp_dir().join("tether-jobs"),
            replay_program: DEFAULT_REPLAY_PROGRAM.to_string(),
            replay_socket: None,
        }
    }
}

impl DebugCaptureConfig {
    /// Create a new builder for DebugCaptureConfig
    pub fn builder() -> DebugCaptureConfigBuilder {
        DebugCaptureConfigBuilder::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether workspaces of successful jobs are deleted
    pub fn delete_on_success(&self) -> bool {
        self.delete_on_success
    }

    /// Directory under which job workspaces are created
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn replay_program(&self) -> &str {
        &self.replay_program
    }

    /// Worker socket named in the reproduction line, if known
    pub fn replay_socket(&self) -> Option<&Path> {
        self.replay_socket.as_deref()
    }
}

/// Builder for DebugCaptureConfig
#[derive(Debug, Default)]
pub struct DebugCaptureConfigBuilder {
    inner: DebugCaptureConfig,
}

impl DebugCaptureConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.inner.enabled = enabled;
        self
    }

    pub fn delete_on_success(mut self, delete: bool) -> Self {
        self.inner.delete_on_success = delete;
        self
    }

    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.inner.root = root.as_ref().to_path_buf();
        self
    }

    pub fn replay_program(mut self, program: impl Into<String>) -> Self {
        self.inner.replay_program = program.into();
        self
    }

    pub fn replay_socket(mut self, socket: impl AsRef<Path>) -> Self {
        self.inner.replay_socket = Some(socket.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> DebugCaptureConfig {
        self.inner
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    poll_interval: Duration,
    default_timeout: Duration,
    capture: DebugCaptureConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_TIMEOUT,
            capture: DebugCaptureConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Create a new builder for DispatcherConfig
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// How often cancellation is checked while waiting
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn capture(&self) -> &DebugCaptureConfig {
        &self.capture
    }
}

/// Builder for DispatcherConfig
#[derive(Debug, Default)]
pub struct DispatcherConfigBuilder {
    inner: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.inner.poll_interval = interval;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.inner.default_timeout = timeout;
        self
    }

    pub fn capture(mut self, capture: DebugCaptureConfig) -> Self {
        self.inner.capture = capture;
        self
    }

    pub fn build(self) -> DispatcherConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.default_timeout(), DEFAULT_TIMEOUT);
        assert!(!config.capture().enabled());
        assert!(config.capture().delete_on_success());
        assert_eq!(config.capture().replay_program(), "tether");
        assert_eq!(config.capture().replay_socket(), None);
    }

    #[test]
    fn test_builder() {
        let config = DispatcherConfig::builder()
            .poll_interval(Duration::from_millis(5))
            .capture(
                DebugCaptureConfig::builder()
                    .enabled(true)
                    .delete_on_success(false)
                    .root("/tmp/captures")
                    .build(),
            )
            .build();

        assert_eq!(config.poll_interval(), Duration::from_millis(5));
        assert!(config.capture().enabled());
        assert!(!config.capture().delete_on_success());
        assert_eq!(config.capture().root(), Path::new("/tmp/captures"));
    }
}
