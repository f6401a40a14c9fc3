//! Store locking for single-cycle safety.
//!
//! Two backup cycles against the same root would race on naming, linking and
//! pruning. The front-end takes an advisory exclusive lock (fs2) on
//! `<root>/.snapvault.lock` for the duration of a cycle. The lock is released
//! on Drop; the file itself is left in place.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{SnapvaultError, SnapvaultResult};

/// Name of the lock file inside the snapshot root
pub const LOCK_FILE_NAME: &str = ".snapvault.lock";

pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the lock without waiting. Fails if another cycle holds it.
    pub fn try_acquire(root: &Path) -> SnapvaultResult<Self> {
        let path = root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SnapvaultError::Lock(format!("open lock file {}: {}", path.display(), e)))?;

        file.try_lock_exclusive().map_err(|e| {
            SnapvaultError::Lock(format!(
                "{} is held by another snapvault process: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // unlock errors on drop are ignored; the OS drops the lock with the fd anyway
        let _ = self.file.unlock();
    }
}
