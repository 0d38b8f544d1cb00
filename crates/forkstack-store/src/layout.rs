use crate::{write_atomic, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current state-directory format version. Incremented on incompatible layout changes.
pub const STATE_FORMAT_VERSION: u32 = 1;
const STATE_DIR: &str = ".forkstack";
const VERSION_FILE: &str = "format";

/// Directory layout for per-project forkstack state.
///
/// Everything lives under `<project root>/.forkstack/`, which carries its own
/// `.gitignore` so descriptors and the pointer stay per-developer. All
/// subdirectories are created lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateVersion {
    format_version: u32,
}

impl StateLayout {
    /// Layout for the project rooted at `project_root`.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(STATE_DIR),
        }
    }

    /// Layout for an explicit state directory.
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: state_dir.into(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn envs_dir(&self) -> PathBuf {
        self.root.join("envs")
    }

    #[inline]
    pub fn env_file(&self, name: &str) -> PathBuf {
        self.envs_dir().join(format!("{name}.json"))
    }

    #[inline]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Advisory lock guarding operations on a single environment.
    #[inline]
    pub fn env_lock_file(&self, name: &str) -> PathBuf {
        self.locks_dir().join(format!("{name}.lock"))
    }

    #[inline]
    pub fn pointer_file(&self) -> PathBuf {
        self.root.join("current")
    }

    #[inline]
    pub fn pointer_lock_file(&self) -> PathBuf {
        self.locks_dir().join(".current.lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.envs_dir())?;
        fs::create_dir_all(self.locks_dir())?;

        let gitignore = self.root.join(".gitignore");
        if !gitignore.exists() {
            write_atomic(&self.root, &gitignore, b"*\n")?;
        }

        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StateVersion {
                format_version: STATE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            write_atomic(&self.root, &version_path, content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.root.join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StateVersion = serde_json::from_str(&content)?;

        if ver.format_version != STATE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}
