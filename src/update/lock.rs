//! Single-flight guard for the update flow.
//!
//! No two update runs may execute concurrently against the same local root.
//! The guard is an OS-level exclusive file lock held for the lifetime of the
//! returned value; it also excludes other processes, not just other tasks.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::HotpatchError;

/// An exclusive lock over one local content root.
#[derive(Debug)]
pub struct UpdateLock {
    _file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Lock file name, created next to the local root.
    pub const FILE_NAME: &'static str = ".update.lock";

    /// Acquire the lock for `local_root`, failing immediately if another
    /// update holds it.
    ///
    /// Concurrent invocation is a caller bug, so the acquisition is
    /// non-blocking: a held lock yields [`HotpatchError::UpdateInProgress`]
    /// rather than queueing behind the other run.
    pub async fn acquire(local_root: &Path) -> Result<Self> {
        let lock_dir = local_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| local_root.to_path_buf());
        crate::utils::ensure_dir(&lock_dir)?;

        let lock_path = lock_dir.join(Self::FILE_NAME);
        let lock_path_clone = lock_path.clone();
        let root_display = local_root.display().to_string();

        // File lock syscalls are blocking; keep them off the runtime.
        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            let acquired = file
                .try_lock_exclusive()
                .with_context(|| format!("Failed to probe lock: {}", lock_path_clone.display()))?;
            if !acquired {
                return Err(HotpatchError::UpdateInProgress { path: root_display }.into());
            }

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        debug!(lock = %lock_path.display(), "update lock acquired");
        Ok(Self { _file: file, path: lock_path })
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Released when the file handle closes; unlock explicitly for clarity.
        if let Err(e) = FileExt::unlock(&self._file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to unlock");
        }
    }
}
