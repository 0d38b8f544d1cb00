use crate::CoreError;
use forkstack_store::StateLayout;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive hold on one environment name. Create, switch and delete on
/// the same name never overlap, across threads or processes.
pub struct EnvLock {
    name: String,
    file: File,
}

impl EnvLock {
    fn open(layout: &StateLayout, name: &str) -> Result<File, CoreError> {
        std::fs::create_dir_all(layout.locks_dir())?;
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(layout.env_lock_file(name))?)
    }

    /// Take the lock or report the name as busy.
    pub fn try_hold(layout: &StateLayout, name: &str) -> Result<Self, CoreError> {
        let file = Self::open(layout, name)?;
        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::OperationInProgress(name.to_owned()));
        }
        tracing::trace!("holding lock for '{name}'");
        Ok(Self {
            name: name.to_owned(),
            file,
        })
    }

    /// Wait for the lock.
    pub fn wait(layout: &StateLayout, name: &str) -> Result<Self, CoreError> {
        let file = Self::open(layout, name)?;
        file.lock_exclusive()?;
        Ok(Self {
            name: name.to_owned(),
            file,
        })
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::debug!("unlocking '{}': {e}", self.name);
        }
    }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Ctrl-C once: the orchestrator stops before its next provider call and
/// records what is outstanding. Ctrl-C twice: exit 130 on the spot.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nforks: interrupted; the fork will be left resumable (Ctrl-C again to abort)");
    });
}

pub fn shutdown_requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> (tempfile::TempDir, StateLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        (dir, layout)
    }

    #[test]
    fn hold_creates_lock_file() {
        let (_dir, layout) = layout();
        let _lock = EnvLock::try_hold(&layout, "alice").unwrap();
        assert!(layout.env_lock_file("alice").exists());
    }

    #[test]
    fn busy_name_is_operation_in_progress() {
        let (_dir, layout) = layout();
        let _lock = EnvLock::wait(&layout, "alice").unwrap();
        assert!(matches!(
            EnvLock::try_hold(&layout, "alice"),
            Err(CoreError::OperationInProgress(n)) if n == "alice"
        ));
    }

    #[test]
    fn drop_releases() {
        let (_dir, layout) = layout();
        drop(EnvLock::try_hold(&layout, "alice").unwrap());
        assert!(EnvLock::try_hold(&layout, "alice").is_ok());
    }

    #[test]
    fn names_are_independent() {
        let (_dir, layout) = layout();
        let _a = EnvLock::try_hold(&layout, "alice").unwrap();
        assert!(EnvLock::try_hold(&layout, "bob").is_ok());
    }
}
