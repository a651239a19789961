//! Debug capture of job requests
//!
//! Writes the request of a job to its own workspace before it is sent, along
//! with a command line that replays the same call against a worker. The
//! workspace survives failed calls so they can be reproduced by hand.

use std::path::{Path, PathBuf};

use crate::codec::{Codec, Json};
use crate::config::DebugCaptureConfig;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::workspace::Workspace;

/// File holding the captured request
pub const REQUEST_FILE: &str = "request.json";

/// File a replayed call writes its response to
pub const RESPONSE_FILE: &str = "response.json";

/// Artifacts of one captured job
#[derive(Debug)]
pub struct DebugCapture {
    workspace: Workspace,
    request_path: PathBuf,
    response_path: PathBuf,
    replay_command: String,
}

impl DebugCapture {
    /// Create a workspace for `job` and persist its request
    pub fn create<J: Job>(config: &DebugCaptureConfig, job: &J) -> Result<Self> {
        let workspace = Workspace::random_in(config.root())?;
        let request_path = workspace.file(REQUEST_FILE);
        let response_path = workspace.file(RESPONSE_FILE);

        let bytes = Json.encode(job).map_err(|e| {
            Error::Workspace(format!(
                "failed to save request to file {}: {e}",
                request_path.display()
            ))
        })?;
        std::fs::write(&request_path, bytes).map_err(|e| {
            Error::Workspace(format!(
                "failed to save request to file {}: {e}",
                request_path.display()
            ))
        })?;

        let replay_command = replay_command(
            config.replay_program(),
            config.replay_socket(),
            job.type_tag(),
            &job.name(),
            &request_path,
            &response_path,
        );

        tracing::info!(path = %request_path.display(), "job request written");
        if config.replay_socket().is_some() {
            tracing::info!("to re-run this request manually, run: {replay_command}");
        } else {
            tracing::info!(
                "to re-run this request manually, set TETHER_SOCKET to the worker socket and run: \
                 {replay_command}"
            );
        }

        Ok(Self {
            workspace,
            request_path,
            response_path,
            replay_command,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    /// Where a replayed call is expected to write its response
    pub fn response_path(&self) -> &Path {
        &self.response_path
    }

    /// Command line reproducing the call
    pub fn replay_command(&self) -> &str {
        &self.replay_command
    }

    /// Delete the workspace and everything in it
    pub fn cleanup(&self) -> Result<()> {
        self.workspace.remove()
    }
}

fn replay_command(
    program: &str,
    socket: Option<&Path>,
    type_tag: u32,
    task: &str,
    request: &Path,
    response: &Path,
) -> String {
    use shell_escape::escape;

    let mut command = format!("{} replay", escape(program.into()));
    if let Some(socket) = socket {
        command.push_str(&format!(" --socket {}", escape(socket.to_string_lossy())));
    }
    command.push_str(&format!(
        " --type-tag {type_tag} --task {} --request {} --response {}",
        escape(task.into()),
        escape(request.to_string_lossy()),
        escape(response.to_string_lossy()),
    ));
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Bake {
        asset: String,
    }

    impl Job for Bake {
        type Response = ();

        fn type_tag(&self) -> u32 {
            42
        }

        fn name(&self) -> String {
            "bake lightmap".to_string()
        }
    }

    #[test]
    fn test_capture_writes_request() {
        let root = Workspace::random_in(std::env::temp_dir()).unwrap();
        let config = DebugCaptureConfig::builder()
            .enabled(true)
            .root(root.path())
            .build();
        let job = Bake {
            asset: "levels/intro.map".to_string(),
        };

        let capture = DebugCapture::create(&config, &job).unwrap();

        assert!(capture.workspace().starts_with(root.path()));
        assert_eq!(capture.request_path(), capture.workspace().join(REQUEST_FILE));
        assert!(!capture.response_path().exists());
        let saved: Bake =
            serde_json::from_slice(&std::fs::read(capture.request_path()).unwrap()).unwrap();
        assert_eq!(saved, job);
        assert!(capture.replay_command().starts_with("tether replay --type-tag 42 "));
        assert!(
            capture
                .replay_command()
                .contains(&*capture.request_path().to_string_lossy())
        );

        capture.cleanup().unwrap();
        assert!(!capture.workspace().exists());
        root.remove().unwrap();
    }

    #[test]
    fn test_replay_command_is_shell_escaped() {
        let command = replay_command(
            "tether",
            None,
            42,
            "bake lightmap",
            Path::new("/tmp/job-a/request.json"),
            Path::new("/tmp/job-a/response.json"),
        );
        assert_eq!(
            command,
            "tether replay --type-tag 42 --task 'bake lightmap' \
             --request /tmp/job-a/request.json --response /tmp/job-a/response.json"
        );
    }

    #[test]
    fn test_replay_command_names_socket() {
        let command = replay_command(
            "tether",
            Some(Path::new("/run/bake worker.sock")),
            7,
            "bake",
            Path::new("/tmp/job-b/request.json"),
            Path::new("/tmp/job-b/response.json"),
        );
        assert_eq!(
            command,
            "tether replay --socket '/run/bake worker.sock' --type-tag 7 --task bake \
             --request /tmp/job-b/request.json --response /tmp/job-b/response.json"
        );
    }

    #[test]
    fn test_unusable_root_is_a_workspace_error() {
        let root = Workspace::random_in(std::env::temp_dir()).unwrap();
        let blocker = root.file("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = DebugCaptureConfig::builder()
            .enabled(true)
            .root(blocker.join("captures"))
            .build();

        let result = DebugCapture::create(&config, &Bake { asset: String::new() });
        assert!(matches!(result, Err(Error::Workspace(_))));
        root.remove().unwrap();
    }
}
