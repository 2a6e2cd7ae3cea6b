//! The manifest exporter: authored groups in, deterministic indices out.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

use super::{AuthoredContent, ExportedManifest, LogicalId, PackageEntry, UNTYPED_KIND};
use crate::core::HotpatchError;
use crate::hash::hash_string;
use crate::utils::{read_toml_file, write_json_file};

/// Scans the authored content set and produces the [`ExportedManifest`].
///
/// The export is pure: given the same authored content the same indices and
/// hashes are produced, which makes re-running it idempotent and the
/// serialized output diffable between builds.
pub struct ManifestExporter;

impl ManifestExporter {
    /// Load the authoring file and export.
    pub fn export_file(authoring_path: &Path) -> Result<ExportedManifest> {
        let content: AuthoredContent = read_toml_file(authoring_path)?;
        Self::export(&content)
    }

    /// Export the given authored content.
    ///
    /// # Errors
    ///
    /// Fails with [`HotpatchError::DuplicateKey`] if any address appears
    /// twice across the whole content set (keys must be unique within one
    /// catalog snapshot), and with [`HotpatchError::BundleNameCollision`]
    /// when two identities produce the same lowercased bundle file name.
    pub fn export(content: &AuthoredContent) -> Result<ExportedManifest> {
        let mut entries: Vec<PackageEntry> = Vec::new();
        let mut seen_keys: BTreeSet<&str> = BTreeSet::new();
        let mut by_kind: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut by_label: BTreeMap<String, Vec<String>> = BTreeMap::new();
        // (group, combined labels) → member keys
        let mut buckets: BTreeMap<LogicalId, Vec<String>> = BTreeMap::new();

        for group in &content.groups {
            for entry in &group.entries {
                if !seen_keys.insert(&entry.address) {
                    return Err(HotpatchError::DuplicateKey {
                        key: entry.address.clone(),
                        group: group.name.clone(),
                    }
                    .into());
                }

                let kind = entry
                    .labels
                    .first()
                    .cloned()
                    .unwrap_or_else(|| UNTYPED_KIND.to_string());

                by_kind.entry(kind.clone()).or_default().push(entry.address.clone());
                for label in &entry.labels {
                    by_label.entry(label.clone()).or_default().push(entry.address.clone());
                }

                buckets
                    .entry(LogicalId::new(&group.name, entry.labels.clone()))
                    .or_default()
                    .push(entry.address.clone());

                entries.push(PackageEntry {
                    key: entry.address.clone(),
                    kind,
                    labels: entry.labels.clone(),
                });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        for keys in by_kind.values_mut() {
            keys.sort();
        }
        for keys in by_label.values_mut() {
            keys.sort();
        }

        // Logical hash: digest over the sorted concatenated member keys of
        // each (group, label-set) bucket. The bundle-identity side-table is
        // produced from the same buckets, at the same time the bundle file
        // names are generated.
        let mut logical_hashes = BTreeMap::new();
        let mut bundle_identities = BTreeMap::new();
        let mut name_sources: BTreeMap<String, String> = BTreeMap::new();
        for (id, mut keys) in buckets {
            keys.sort();
            let logical_hash = hash_string(&keys.join("\n"));
            debug!(identity = %id.key(), members = keys.len(), "computed logical hash");

            let file_name = id.bundle_file_name();
            if let Some(first) = name_sources.insert(file_name.clone(), id.key()) {
                // Lowercasing folds "Core" and "core" onto one file name;
                // letting one silently shadow the other would ship a bundle
                // attributed to the wrong identity.
                return Err(HotpatchError::BundleNameCollision {
                    file: file_name,
                    first,
                    second: id.key(),
                }
                .into());
            }
            bundle_identities.insert(file_name, logical_hash.clone());
            logical_hashes.insert(id.key(), logical_hash);
        }

        info!(
            entries = entries.len(),
            bundles = bundle_identities.len(),
            "manifest export complete"
        );

        Ok(ExportedManifest { entries, by_kind, by_label, logical_hashes, bundle_identities })
    }

    /// Export and serialize to `<out_dir>/manifest_export.json`.
    pub fn export_to_dir(authoring_path: &Path, out_dir: &Path) -> Result<ExportedManifest> {
        let export = Self::export_file(authoring_path)?;
        write_json_file(&out_dir.join(ExportedManifest::FILE_NAME), &export, true)?;
        Ok(export)
    }
}
