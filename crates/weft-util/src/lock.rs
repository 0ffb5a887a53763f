//! Exclusive per-project lock.
//!
//! An install holds `<project>/.weft/lock` for its whole duration. The lock is
//! an OS-level advisory lock taken without blocking: a second invocation in
//! the same project directory fails immediately with
//! [`WeftError::ProjectLocked`]. Dropping the guard releases it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::{WeftError, WeftResult};

/// Guard for the project lock; released on drop.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    file: File,
}

impl ProjectLock {
    /// Lock file location for a project root.
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(".weft").join("lock")
    }

    /// Take the lock for `project_root`, failing fast if another process has it.
    pub fn acquire(project_root: &Path) -> WeftResult<Self> {
        let path = Self::path_for(project_root);
        if let Some(parent) = path.parent() {
            crate::fs::ensure_dir(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("acquired project lock {}", path.display());
                Ok(Self { path, file })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(WeftError::ProjectLocked { path })
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(WeftError::ProjectLocked { path })
            }
            Err(e) => Err(WeftError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
