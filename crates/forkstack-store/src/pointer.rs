//! The current-environment pointer.
//!
//! A single value naming the active environment. Application glue reads it;
//! only the orchestrator writes it. Resolution order is explicit override,
//! then the persisted value, then [`DEFAULT_ENV`].

use crate::layout::StateLayout;
use crate::{write_atomic, StoreError};
use forkstack_schema::{validate_env_name, DEFAULT_ENV};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

/// Process-level override for the active environment.
pub const OVERRIDE_VAR: &str = "FORKSTACK_ENV";
const LEGACY_OVERRIDE_VAR: &str = "ENV";

pub trait PointerStore: Send + Sync {
    /// The persisted name, if any.
    fn read(&self) -> Result<Option<String>, StoreError>;

    /// Replace the persisted name. Readers see either the old or the new value.
    fn write(&self, name: &str) -> Result<(), StoreError>;

    /// Remove the persisted name, but only while it still equals `expected`.
    /// Returns whether it was removed. A write that lands first wins.
    fn clear_if(&self, expected: &str) -> Result<bool, StoreError>;
}

/// Pointer persisted as a one-line file, replaced by atomic rename.
pub struct FilePointer {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FilePointer {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            path: layout.pointer_file(),
            lock_path: layout.pointer_lock_file(),
        }
    }

    fn with_write_lock<T>(
        &self,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        lock.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("pointer lock: {e}")))?;
        let result = f();
        let _ = lock.unlock();
        result
    }
}

impl PointerStore for FilePointer {
    fn read(&self) -> Result<Option<String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let name = content.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if let Err(e) = validate_env_name(name) {
            tracing::warn!("ignoring invalid pointer value: {e}");
            return Ok(None);
        }
        Ok(Some(name.to_owned()))
    }

    fn write(&self, name: &str) -> Result<(), StoreError> {
        validate_env_name(name)?;
        let dir = self
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        fs::create_dir_all(&dir)?;
        self.with_write_lock(|| write_atomic(&dir, &self.path, format!("{name}\n").as_bytes()))
    }

    fn clear_if(&self, expected: &str) -> Result<bool, StoreError> {
        self.with_write_lock(|| {
            if self.read()?.as_deref() != Some(expected) {
                return Ok(false);
            }
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// In-process pointer for tests and embedding.
#[derive(Default)]
pub struct MemoryPointer {
    value: Mutex<Option<String>>,
}

impl MemoryPointer {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, StoreError> {
        self.value
            .lock()
            .map_err(|e| StoreError::LockFailed(format!("pointer mutex poisoned: {e}")))
    }
}

impl PointerStore for MemoryPointer {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.guard()?.clone())
    }

    fn write(&self, name: &str) -> Result<(), StoreError> {
        validate_env_name(name)?;
        *self.guard()? = Some(name.to_owned());
        Ok(())
    }

    fn clear_if(&self, expected: &str) -> Result<bool, StoreError> {
        let mut value = self.guard()?;
        if value.as_deref() == Some(expected) {
            *value = None;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Where the resolved environment name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerOrigin {
    Override,
    Pointer,
    Default,
}

/// Resolve the active environment: override, persisted pointer, default.
pub fn resolve_current(
    pointer: &dyn PointerStore,
    override_name: Option<&str>,
) -> Result<(String, PointerOrigin), StoreError> {
    if let Some(name) = override_name {
        return Ok((name.to_owned(), PointerOrigin::Override));
    }
    Ok(match pointer.read()? {
        Some(name) => (name, PointerOrigin::Pointer),
        None => (DEFAULT_ENV.to_owned(), PointerOrigin::Default),
    })
}

/// Map deployment-style names onto environment names (`production` → `prod`).
pub fn normalize_override(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let mapped = match lowered.as_str() {
        "" => return None,
        "production" => "prod".to_owned(),
        "development" => "dev".to_owned(),
        other => other.to_owned(),
    };
    validate_env_name(&mapped).ok().map(|()| mapped)
}

/// Read `FORKSTACK_ENV`, falling back to the conventional `ENV` variable.
pub fn env_override_from_process() -> Option<String> {
    [OVERRIDE_VAR, LEGACY_OVERRIDE_VAR]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|raw| normalize_override(&raw))
}
