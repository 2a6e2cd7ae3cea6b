//! Staged-to-local promotion: the only code that mutates the local content
//! root.
//!
//! Before [`StagingPromoter::promote`] runs, the local root is byte-identical
//! to the previous version; after it completes without error, the local root
//! is byte-identical to the new version. Bundles, catalog, and descriptor
//! become visible as one unit, never individually. A crash mid-move leaves
//! the staging directory behind, which the orchestrator detects on the next
//! start and discards.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::package::BUNDLE_DIR;
use crate::utils::{ensure_dir, move_dir_contents};

/// Applies a fully-downloaded staging directory to the local content root.
pub struct StagingPromoter;

impl StagingPromoter {
    /// Promote `staging_root` into `local_root`.
    ///
    /// First deletes every local bundle matching a prefix in `delete_list`
    /// (best-effort: a missing or locked file is logged and skipped, never
    /// aborting the promotion), then moves all staged files into the local
    /// root, overwriting same-named files, and removes the emptied staging
    /// root.
    ///
    /// # Errors
    ///
    /// The move phase is fatal on failure: the caller must not mark the
    /// update promoted, and the surviving staging directory marks the
    /// promotion incomplete for the next run.
    pub fn promote(delete_list: &[String], staging_root: &Path, local_root: &Path) -> Result<()> {
        Self::delete_superseded(delete_list, local_root);

        move_dir_contents(staging_root, local_root).with_context(|| {
            format!(
                "Failed to promote staging {} into {}",
                staging_root.display(),
                local_root.display()
            )
        })?;

        info!(local_root = %local_root.display(), "promotion complete");
        Ok(())
    }

    /// Delete every entry under `local_root/bundles/` whose file name starts
    /// with one of the given prefixes. Best-effort by design.
    fn delete_superseded(delete_list: &[String], local_root: &Path) {
        if delete_list.is_empty() {
            return;
        }

        let bundle_dir = local_root.join(BUNDLE_DIR);
        let entries = match fs::read_dir(&bundle_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %bundle_dir.display(), error = %e, "no local bundles to prune");
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if delete_list.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!(bundle = %name, "deleted superseded bundle"),
                    Err(e) => {
                        warn!(bundle = %name, error = %e, "failed to delete superseded bundle")
                    }
                }
            }
        }
    }

    /// Delete the entire local content root and recreate the expected empty
    /// skeleton.
    ///
    /// Used on major-version incompatibility, before any download begins, so
    /// no cross-major-version file ever survives alongside new content.
    pub fn wipe_all(root: &Path) -> Result<()> {
        if root.exists() {
            fs::remove_dir_all(root)
                .with_context(|| format!("Failed to wipe local root: {}", root.display()))?;
            info!(root = %root.display(), "local content root wiped");
        }
        ensure_dir(&root.join(BUNDLE_DIR))?;
        Ok(())
    }
}
