//! Filesystem-backed providers for offline use and tests.
//!
//! A local database is a single file per environment; local storage is a
//! directory tree whose forks live under `<root>/<prefix><env>/`. Neither
//! backend has copy-on-write, so forking always copies.

use crate::s3::FORK_MARKER;
use crate::{CallContext, ProviderAdapter, ProviderError};
use forkstack_schema::{ResourceKind, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SQLite-style database files: `<dir>/<project>-<env>.db`.
pub struct LocalDatabaseAdapter {
    dir: PathBuf,
}

impl LocalDatabaseAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn database_path(&self, project: &str, env: &str) -> PathBuf {
        self.dir.join(format!("{project}-{env}.db"))
    }

    fn handle(path: &Path) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Database,
            "local",
            format!("file://{}", path.display()),
        )
    }
}

impl ProviderAdapter for LocalDatabaseAdapter {
    fn provider_id(&self) -> &'static str {
        "local"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let from = self.database_path(ctx.project(), source);
        let to = self.database_path(ctx.project(), env);
        if !from.is_file() {
            return Err(ProviderError::permanent(format!(
                "source database {} does not exist",
                from.display()
            )));
        }
        if to.exists() {
            return Err(ProviderError::permanent(format!(
                "database {} already exists",
                to.display()
            )));
        }
        tracing::debug!("local: copying {} to {}", from.display(), to.display());

        let staging = to.with_extension("db.tmp");
        fs::copy(&from, &staging)?;
        if let Err(e) = fs::rename(&staging, &to) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(Self::handle(&to))
    }

    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let path = self.database_path(ctx.project(), env);
        if !path.is_file() {
            return Err(ProviderError::not_found(format!(
                "database {} not found",
                path.display()
            )));
        }
        Ok(Self::handle(&path))
    }

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete the production database",
            ));
        }
        let path = self.database_path(ctx.project(), env);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Directory-tree storage with prefix forks, mirroring [`S3Adapter`].
///
/// [`S3Adapter`]: crate::s3::S3Adapter
pub struct LocalStorageAdapter {
    root: PathBuf,
    prefix: String,
    full_copy_timeout: Duration,
}

impl LocalStorageAdapter {
    pub fn new(root: impl Into<PathBuf>, prefix: &str, full_copy_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.to_owned(),
            full_copy_timeout,
        }
    }

    pub fn fork_dir(&self, env: &str) -> PathBuf {
        self.root.join(format!("{}{env}", self.prefix))
    }

    /// First path component of the fork prefix, skipped when copying production.
    fn prefix_root(&self) -> Option<&str> {
        self.prefix.split('/').find(|c| !c.is_empty())
    }

    fn handle(path: &Path) -> ResourceHandle {
        ResourceHandle::ready(
            ResourceKind::Storage,
            "local",
            format!("file://{}/", path.display()),
        )
    }

    /// Copy `src` into `dst`. `fork` is the directory being populated; it
    /// can sit inside `src` when the prefix is empty and is never descended.
    fn copy_tree(
        &self,
        ctx: &CallContext,
        src: &Path,
        dst: &Path,
        fork: &Path,
        top_level: bool,
    ) -> Result<usize, ProviderError> {
        let mut count = 0;
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            if ctx.expired() {
                return Err(ProviderError::transient(format!(
                    "full copy into {} exceeded its time budget",
                    dst.display()
                )));
            }
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            if name == FORK_MARKER {
                continue;
            }
            if path.is_dir() {
                let skip_prefix =
                    top_level && self.prefix_root().is_some_and(|p| name == *p);
                if skip_prefix || path == fork || path.join(FORK_MARKER).exists() {
                    continue;
                }
                count += self.copy_tree(ctx, &path, &dst.join(&name), fork, false)?;
            } else {
                fs::copy(&path, dst.join(&name))?;
                count += 1;
            }
        }
        Ok(count)
    }
}

impl ProviderAdapter for LocalStorageAdapter {
    fn provider_id(&self) -> &'static str {
        "local"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let target = self.fork_dir(env);
        if target.exists() {
            return Err(ProviderError::permanent(format!(
                "{} already exists",
                target.display()
            )));
        }
        let from = if source == DEFAULT_SOURCE {
            self.root.clone()
        } else {
            self.fork_dir(source)
        };
        if !from.is_dir() {
            return Err(ProviderError::permanent(format!(
                "source {} does not exist",
                from.display()
            )));
        }

        let copied = self
            .copy_tree(ctx, &from, &target, &target, source == DEFAULT_SOURCE)
            .and_then(|count| {
                fs::write(target.join(FORK_MARKER), b"")?;
                Ok(count)
            });
        match copied {
            Ok(count) => {
                tracing::debug!("local: copied {count} files into {}", target.display());
                Ok(Self::handle(&target))
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&target) {
                    tracing::warn!(
                        "local: could not remove partial copy {}: {cleanup}",
                        target.display()
                    );
                }
                Err(e)
            }
        }
    }

    fn locate(&self, _ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        let dir = self.fork_dir(env);
        if !dir.join(FORK_MARKER).exists() {
            return Err(ProviderError::not_found(format!(
                "{} not found",
                dir.display()
            )));
        }
        Ok(Self::handle(&dir))
    }

    fn delete(&self, _ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent(
                "refusing to delete production storage",
            ));
        }
        match fs::remove_dir_all(self.fork_dir(env)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn create_timeout(&self) -> Option<Duration> {
        Some(self.full_copy_timeout)
    }
}
