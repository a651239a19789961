use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use tether::{DebugCaptureConfig, DispatcherConfig};

use crate::cli::DispatchArgs;

/// TOML config file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Worker socket path
    pub socket: Option<PathBuf>,

    /// Dispatch settings
    pub dispatch: DispatchSection,

    /// Debug capture settings
    pub capture: CaptureSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub enabled: Option<bool>,
    pub delete_on_success: Option<bool>,
    pub root: Option<PathBuf>,
}

/// Load config from file
pub fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let config: FileConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(FileConfig::default()),
    }
}

/// Pick the worker socket (CLI takes precedence)
pub fn resolve_socket(cli: Option<&Path>, file: &FileConfig) -> Result<PathBuf> {
    cli.map(Path::to_path_buf)
        .or_else(|| file.socket.clone())
        .context("no worker socket given (use --socket, TETHER_SOCKET or `socket` in the config file)")
}

/// Merge file config with CLI args (CLI takes precedence)
///
/// `socket` is named in the reproduction line of captured jobs.
pub fn merge_dispatcher_config(
    file: &FileConfig,
    cli: &DispatchArgs,
    socket: &Path,
) -> Result<DispatcherConfig> {
    let mut builder = DispatcherConfig::builder();

    // Timeout: CLI > file > library default
    if let Some(secs) = cli.timeout.or(file.dispatch.timeout_secs) {
        builder = builder.default_timeout(Duration::from_secs(secs));
    }

    if let Some(ms) = cli.poll_interval_ms.or(file.dispatch.poll_interval_ms) {
        if ms == 0 {
            anyhow::bail!("poll interval must be at least 1 ms");
        }
        builder = builder.poll_interval(Duration::from_millis(ms));
    }

    let mut capture = DebugCaptureConfig::builder()
        .enabled(cli.capture || file.capture.enabled.unwrap_or(false))
        .replay_socket(socket);

    // --keep-artifacts only ever turns deletion off
    let delete_on_success = file.capture.delete_on_success.unwrap_or(true) && !cli.keep_artifacts;
    capture = capture.delete_on_success(delete_on_success);

    if let Some(root) = cli.capture_root.as_ref().or(file.capture.root.as_ref()) {
        capture = capture.root(root);
    }

    Ok(builder.capture(capture.build()).build())
}
