//! Ephemeral workspaces for debug artifacts
//!
//! Each captured job gets its own directory. Names are four random English
//! words connected by hyphens and prefixed with `job-`, which keeps them
//! easy to spot and to type when reproducing a call by hand.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Word list for generating random directory names
const WORDS: &[&str] = &[
    "apple", "banana", "cherry", "dragon", "eagle", "falcon", "garden", "harbor",
    "island", "jungle", "kitten", "lemon", "mango", "night", "ocean", "planet",
    "queen", "river", "silver", "tiger", "umbrella", "violet", "winter", "yellow",
    "zebra", "anchor", "bridge", "castle", "desert", "ember", "forest", "glacier",
    "horizon", "ivory", "jasmine", "kingdom", "lantern", "meadow", "nebula", "orchid",
    "phoenix", "quartz", "rainbow", "shadow", "thunder", "urban", "velvet", "whisper",
    "crystal", "dolphin", "eclipse", "firefly", "granite", "hollow", "indigo", "journey",
    "karma", "lotus", "marble", "nomad", "oasis", "prism", "quest", "ripple",
    "sphinx", "temple", "unity", "vortex", "willow", "xenon", "yonder", "zenith",
    "amber", "blazer", "copper", "dusk", "ether", "flame", "golden", "haze",
    "iron", "jade", "kindle", "lunar", "mystic", "nova", "onyx", "pearl",
    "radiant", "storm", "tidal", "ultra", "vivid", "wave", "azure", "breeze",
];

const NAME_PREFIX: &str = "job-";

/// A uniquely named directory holding the artifacts of one job
///
/// Dropping a workspace leaves the directory on disk; only [`Workspace::remove`]
/// deletes it.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Create a workspace with a random name under `root`
    ///
    /// `root` is created if needed. Will retry with different names if the
    /// generated path already exists.
    pub fn random_in(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        const MAX_ATTEMPTS: usize = 10;

        std::fs::create_dir_all(root).map_err(|e| {
            Error::Workspace(format!(
                "failed to create workspace root {}: {e}",
                root.display()
            ))
        })?;

        for attempt in 0..MAX_ATTEMPTS {
            let name = generate_random_name();
            let path = root.join(&name);

            // create_dir fails on an existing path, so two callers never share a name
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "created job workspace");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::debug!(
                        name = %name,
                        attempt = attempt + 1,
                        "job workspace already exists, retrying"
                    );
                }
                Err(e) => {
                    return Err(Error::Workspace(format!(
                        "failed to create job workspace {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        Err(Error::Workspace(format!(
            "failed to generate unique workspace name after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Get the path to the workspace
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the directory name (last component of the path)
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }

    /// Path of a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the workspace and all its contents
    ///
    /// Removing a workspace that no longer exists is not an error.
    pub fn remove(&self) -> Result<()> {
        // remove_dir_all refuses to open special files such as sockets, so
        // std's unlink-based walk gets a second try
        let removed = remove_dir_all::remove_dir_all(&self.path).or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(e);
            }
            tracing::debug!(error = %e, path = %self.path.display(), "retrying workspace removal");
            std::fs::remove_dir_all(&self.path)
        });

        match removed {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed job workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Workspace(format!(
                "failed to remove job workspace {}: {e}",
                self.path.display()
            ))),
        }
    }
}

impl AsRef<Path> for Workspace {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Generate a random name with four words connected by hyphens
fn generate_random_name() -> String {
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    let mut rng = thread_rng();
    let words: Vec<&str> = WORDS.choose_multiple(&mut rng, 4).copied().collect();

    format!("{NAME_PREFIX}{}", words.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_name() {
        let name = generate_random_name();
        let rest = name.strip_prefix(NAME_PREFIX).unwrap();
        let parts: Vec<&str> = rest.split('-').collect();
        assert_eq!(parts.len(), 4);
        for part in parts {
            assert!(WORDS.contains(&part));
        }
    }

    #[test]
    fn test_workspace_in_temp() {
        let temp_dir = std::env::temp_dir();
        let workspace = Workspace::random_in(&temp_dir).unwrap();

        assert!(workspace.path().is_dir());
        assert!(workspace.path().starts_with(&temp_dir));
        assert!(workspace.name().unwrap().starts_with(NAME_PREFIX));

        workspace.remove().unwrap();
        assert!(!workspace.path().exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let workspace = Workspace::random_in(std::env::temp_dir()).unwrap();
        std::fs::write(workspace.file("request.json"), b"{}").unwrap();

        workspace.remove().unwrap();
        workspace.remove().unwrap();
        assert!(!workspace.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_with_socket_inside() {
        let workspace = Workspace::random_in(std::env::temp_dir()).unwrap();
        let socket = workspace.file("worker.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        std::fs::create_dir(workspace.file("nested")).unwrap();
        std::fs::write(workspace.file("nested").join("request.json"), b"{}").unwrap();

        workspace.remove().unwrap();
        assert!(!workspace.path().exists());
    }

    #[test]
    fn test_drop_keeps_directory() {
        let path = {
            let workspace = Workspace::random_in(std::env::temp_dir()).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(path.exists());
        std::fs::remove_dir(&path).ok();
    }

    #[test]
    fn test_root_is_created() {
        let parent = Workspace::random_in(std::env::temp_dir()).unwrap();
        let root = parent.path().join("nested").join("captures");

        let workspace = Workspace::random_in(&root).unwrap();
        assert!(workspace.path().starts_with(&root));

        parent.remove().unwrap();
    }
}
