//! Local state for forkstack: environment descriptors and the active-environment pointer.
//!
//! This crate provides the storage layer: `StateLayout` for the per-project
//! `.forkstack/` directory, `DescriptorStore` for per-environment records of
//! provisioned resources, and `PointerStore` implementations holding the name
//! of the active environment. Every write goes through a temp file and an
//! atomic rename so readers never observe a torn record.

pub mod descriptor;
pub mod layout;
pub mod pointer;

pub use descriptor::{DescriptorStore, EnvStatus, Environment, ResourceHandle, ResourceStatus};
pub use layout::{StateLayout, STATE_FORMAT_VERSION};
pub use pointer::{
    env_override_from_process, normalize_override, resolve_current, FilePointer, MemoryPointer,
    PointerOrigin, PointerStore, OVERRIDE_VAR,
};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `content` to `dest` via a temp file in `dir` and an atomic rename.
pub(crate) fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for environment '{name}': expected {expected}, got {actual}")]
    IntegrityFailure {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("environment not found: {0}")]
    EnvNotFound(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("state format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid environment name: {0}")]
    InvalidName(#[from] forkstack_schema::ConfigError),
}
