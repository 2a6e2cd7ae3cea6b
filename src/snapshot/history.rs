//! Append-only snapshot history with a head pointer and one staging slot.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BuildSnapshot;
use crate::core::HotpatchError;
use crate::utils::{ensure_dir, read_json_file, write_json_file};

/// Pointer record naming the released head and the optional staged snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HeadPointer {
    /// File name of the last fully-released snapshot
    head: Option<String>,
    /// File name of the snapshot built but not yet confirmed live
    staged: Option<String>,
}

/// On-disk snapshot history rooted at a directory.
///
/// Layout: one `<version>.json` file per snapshot plus a `head.json` pointer.
/// Snapshots are append-only; releasing a build moves the staged pointer to
/// head. At most one snapshot may be staged at a time; a second `stage`
/// call before `promote_staged` or `discard_staged` is an error, because the
/// delete list of the next build is always computed against the released
/// head.
pub struct SnapshotHistory {
    root: PathBuf,
    pointer: HeadPointer,
}

impl SnapshotHistory {
    const POINTER_FILE: &'static str = "head.json";

    /// Open (or initialize) a history rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        ensure_dir(root)?;
        let pointer_path = root.join(Self::POINTER_FILE);
        let pointer = if pointer_path.exists() {
            read_json_file(&pointer_path)?
        } else {
            HeadPointer::default()
        };
        Ok(Self { root: root.to_path_buf(), pointer })
    }

    /// The last fully-released snapshot, if any build was ever released.
    pub fn head(&self) -> Result<Option<BuildSnapshot>> {
        self.read_named(self.pointer.head.as_deref())
    }

    /// The snapshot built but not yet confirmed live, if one exists.
    pub fn staged(&self) -> Result<Option<BuildSnapshot>> {
        self.read_named(self.pointer.staged.as_deref())
    }

    /// Record a new snapshot in the staging slot.
    ///
    /// # Errors
    ///
    /// [`HotpatchError::SnapshotAlreadyStaged`] if a staged snapshot exists.
    pub fn stage(&mut self, snapshot: &BuildSnapshot) -> Result<()> {
        if let Some(staged) = self.staged()? {
            return Err(HotpatchError::SnapshotAlreadyStaged {
                version: staged.version.to_string(),
            }
            .into());
        }

        let file_name = format!("{}.json", snapshot.version);
        write_json_file(&self.root.join(&file_name), snapshot, true)?;
        self.pointer.staged = Some(file_name);
        self.save_pointer()?;
        debug!(version = %snapshot.version, "snapshot staged");
        Ok(())
    }

    /// Confirm the staged snapshot as released: it becomes the new head and
    /// is appended to the chain.
    pub fn promote_staged(&mut self) -> Result<BuildSnapshot> {
        let staged_name = self
            .pointer
            .staged
            .take()
            .ok_or_else(|| anyhow::anyhow!("No staged snapshot to promote"))?;
        let snapshot: BuildSnapshot = read_json_file(&self.root.join(&staged_name))?;
        self.pointer.head = Some(staged_name);
        self.save_pointer()?;
        info!(version = %snapshot.version, "snapshot promoted to head");
        Ok(snapshot)
    }

    /// Drop the staged snapshot without releasing it.
    pub fn discard_staged(&mut self) -> Result<()> {
        if let Some(name) = self.pointer.staged.take() {
            let path = self.root.join(&name);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            self.save_pointer()?;
            debug!(snapshot = %name, "staged snapshot discarded");
        }
        Ok(())
    }

    fn read_named(&self, name: Option<&str>) -> Result<Option<BuildSnapshot>> {
        match name {
            Some(name) => Ok(Some(read_json_file(&self.root.join(name))?)),
            None => Ok(None),
        }
    }

    fn save_pointer(&self) -> Result<()> {
        write_json_file(&self.root.join(Self::POINTER_FILE), &self.pointer, true)
    }
}
