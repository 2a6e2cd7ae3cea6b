//! The `pack` command: raw build output → versioned, publishable package.

use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::hash::hash_file;
use crate::manifest::{AuthoredContent, ExportedManifest, ManifestExporter, ManifestPointer};
use crate::package::{BuildOrganizer, OrganizeRequest};
use crate::snapshot::{BuildSnapshot, SnapshotHistory, delete_list_from_diff};
use crate::utils::{read_json_file, read_toml_file, write_json_file};
use crate::version::{VersionNumber, VersionStore};

/// Organize one build into a versioned package under the publish root.
///
/// The command computes the next version, snapshots the authored content,
/// diffs it against the previous release to compute the delete list,
/// organizes the raw build output into `<out>/pkg_<version>/`, commits the
/// persistent version counter, and finally republishes `<out>/manifest.json`
/// to point at the new package. The pointer is written only after the
/// package descriptor exists, so a crash anywhere in between leaves clients
/// on the previous release; a failed build consumes no version number.
#[derive(Args)]
pub struct PackCommand {
    /// Authored content declaration (snapshotted for change detection)
    #[arg(long, default_value = "content.toml")]
    content: PathBuf,

    /// Directory holding the raw, unstructured build output
    #[arg(long)]
    raw_dir: PathBuf,

    /// Publish root; the package directory and manifest pointer land here
    #[arg(long)]
    out: PathBuf,

    /// Precomputed manifest export; re-exported from `--content` when absent
    #[arg(long)]
    export: Option<PathBuf>,

    /// Directory for build state (version counter, snapshot history)
    #[arg(long, default_value = ".hotpatch")]
    state_dir: PathBuf,

    /// Bump the major version (wipes clients' local content on update)
    #[arg(long, conflicts_with = "minor")]
    major: bool,

    /// Bump the minor version
    #[arg(long)]
    minor: bool,

    /// Override the configured package size limit, in bytes
    #[arg(long)]
    size_limit: Option<u64>,
}

impl PackCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let export = self.load_export()?;
        let content: AuthoredContent = read_toml_file(&self.content)
            .with_context(|| format!("Failed to read content: {}", self.content.display()))?;

        // The prospective version is committed to the store only after the
        // package is fully organized; a failed build must not consume it.
        let mut store = VersionStore::load(&self.state_dir)?;
        let version = if self.major {
            store.version().bump_major()
        } else if self.minor {
            store.version().bump_minor()
        } else {
            store.version().bump_patch()
        };
        info!(version = %version, "packing release");

        let mut history = SnapshotHistory::open(&self.state_dir)?;
        let snapshot = self.capture_snapshot(version, &content, history.head()?.as_ref())?;
        history.stage(&snapshot)?;

        let package_dir = self.out.join(format!("pkg_{version}"));
        let request = OrganizeRequest {
            raw_dir: &self.raw_dir,
            package_dir: &package_dir,
            export: &export,
            version,
            delete_list: snapshot.delete_list.clone(),
            size_limit: self.size_limit.unwrap_or(config.build.size_limit),
        };

        let state = match BuildOrganizer::organize(&request) {
            Ok(state) => state,
            Err(e) => {
                // The release never happened; the next build diffs against
                // the same head as this one did.
                history.discard_staged()?;
                return Err(e);
            }
        };
        history.promote_staged()?;
        let build = store.commit_build(version)?;
        debug!(build, "version store committed");

        // Republish the pointer last.
        let pointer = ManifestPointer {
            latest_package: format!("pkg_{version}"),
            latest_version: version,
        };
        write_json_file(&self.out.join(ManifestPointer::FILE_NAME), &pointer, true)?;

        println!(
            "Packed {} ({} bundles, {} bytes) into {}",
            version,
            state.bundles.len(),
            state.total_size,
            package_dir.display()
        );
        if !state.delete_list.is_empty() {
            println!("Superseded bundle prefixes: {}", state.delete_list.join(", "));
        }
        Ok(())
    }

    fn load_export(&self) -> Result<ExportedManifest> {
        match &self.export {
            Some(path) => read_json_file(path)
                .with_context(|| format!("Failed to read export: {}", path.display())),
            None => ManifestExporter::export_file(&self.content),
        }
    }

    /// Snapshot the authored content, hashing each source asset relative to
    /// the declaration's directory, and compute the delete list against the
    /// previous release.
    fn capture_snapshot(
        &self,
        version: VersionNumber,
        content: &AuthoredContent,
        previous: Option<&BuildSnapshot>,
    ) -> Result<BuildSnapshot> {
        let content_root = self.content.parent().unwrap_or(Path::new("."));

        let mut hashes: BTreeMap<String, String> = BTreeMap::new();
        for group in &content.groups {
            for entry in &group.entries {
                let source = content_root.join(&entry.path);
                let digest = hash_file(&source).with_context(|| {
                    format!("Failed to hash source asset '{}': {}", entry.address, source.display())
                })?;
                hashes.insert(entry.address.clone(), digest);
            }
        }

        let mut snapshot = BuildSnapshot::capture(version, content, &hashes);

        if let Some(previous) = previous {
            snapshot.delete_list = delete_list_from_diff(previous, &snapshot);
            debug!(
                prefixes = snapshot.delete_list.len(),
                "computed delete list against previous release"
            );
        }
        Ok(snapshot)
    }
}
