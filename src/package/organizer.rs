//! Arranges raw build output into the canonical package layout.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{BUNDLE_DIR, BundleInfo, CATALOG_FILE, UNKNOWN_IDENTITY, VERSION_STATE_FILE, VersionState};
use crate::core::HotpatchError;
use crate::hash::{hash_directory, hash_file};
use crate::manifest::ExportedManifest;
use crate::utils::ensure_dir;
use crate::version::VersionNumber;

/// Classification of one raw build output file.
#[derive(Debug, PartialEq, Eq)]
enum RawFileKind {
    Catalog,
    CatalogChecksum,
    Bundle,
}

fn classify(path: &Path) -> RawFileKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => RawFileKind::Catalog,
        Some("hash") => RawFileKind::CatalogChecksum,
        _ => RawFileKind::Bundle,
    }
}

/// Inputs for one organize run.
pub struct OrganizeRequest<'a> {
    /// Directory holding the raw, unstructured build output
    pub raw_dir: &'a Path,
    /// Target package directory (created if absent)
    pub package_dir: &'a Path,
    /// Export produced alongside this build, used to attribute bundles
    pub export: &'a ExportedManifest,
    /// Version this package publishes
    pub version: VersionNumber,
    /// Bundle-name prefixes superseded by this build
    pub delete_list: Vec<String>,
    /// Maximum allowed total bundle size in bytes; `0` disables the check
    pub size_limit: u64,
}

/// Produces the canonical package layout from raw build output and computes
/// the package-level [`VersionState`].
///
/// The descriptor is written last: a package directory without
/// `version_state.json` is by definition incomplete and is never picked up
/// by clients (the manifest pointer is published separately, after the
/// descriptor exists).
pub struct BuildOrganizer;

impl BuildOrganizer {
    /// Organize one build.
    ///
    /// # Errors
    ///
    /// - any copy or hash failure aborts the whole operation; the descriptor
    ///   is never written for a partially-organized directory
    /// - [`HotpatchError::SizeLimitExceeded`] when the accumulated bundle
    ///   size crosses `size_limit` (checked before the descriptor is written)
    pub fn organize(request: &OrganizeRequest<'_>) -> Result<VersionState> {
        let bundle_dir = request.package_dir.join(BUNDLE_DIR);
        ensure_dir(&bundle_dir)?;

        let mut bundles: Vec<BundleInfo> = Vec::new();
        let mut total_size: u64 = 0;
        let mut catalog_found = false;

        for entry in fs::read_dir(request.raw_dir)
            .with_context(|| format!("Failed to read raw build dir: {}", request.raw_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let src: PathBuf = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            match classify(&src) {
                RawFileKind::Catalog => {
                    let dst = request.package_dir.join(CATALOG_FILE);
                    fs::copy(&src, &dst).with_context(|| {
                        format!("Failed to copy catalog {} to {}", src.display(), dst.display())
                    })?;
                    catalog_found = true;
                    debug!(from = %file_name, "copied catalog");
                }
                RawFileKind::CatalogChecksum => {
                    // The runtime re-verifies everything by content digest;
                    // the generated checksum sidecar is redundant.
                    debug!(file = %file_name, "discarding catalog checksum");
                }
                RawFileKind::Bundle => {
                    let dst = bundle_dir.join(&file_name);
                    fs::copy(&src, &dst).with_context(|| {
                        format!("Failed to copy bundle {} to {}", src.display(), dst.display())
                    })?;

                    let hash = hash_file(&dst)?;
                    let size = fs::metadata(&dst)
                        .with_context(|| format!("Failed to stat bundle: {}", dst.display()))?
                        .len();
                    total_size += size;

                    let logical_key = match request.export.identity_of(&file_name) {
                        Some(hash) => hash.to_string(),
                        None => {
                            warn!(
                                bundle = %file_name,
                                "no logical identity in export side-table; \
                                 artifact cannot be attributed for diffing"
                            );
                            UNKNOWN_IDENTITY.to_string()
                        }
                    };

                    bundles.push(BundleInfo { bundle_name: file_name, hash, size, logical_key });
                }
            }
        }

        if !catalog_found {
            anyhow::bail!(
                "No catalog file found in raw build output: {}",
                request.raw_dir.display()
            );
        }

        // A zero limit disables the check.
        if request.size_limit > 0 && total_size > request.size_limit {
            return Err(HotpatchError::SizeLimitExceeded {
                actual: total_size,
                limit: request.size_limit,
            }
            .into());
        }

        bundles.sort_by(|a, b| a.bundle_name.cmp(&b.bundle_name));

        // Rollup over the organized directory, descriptor excluded.
        let rollup = hash_directory(request.package_dir, VERSION_STATE_FILE)?;

        let state = VersionState {
            version: request.version,
            hash: rollup,
            total_size,
            bundles,
            delete_list: request.delete_list.clone(),
        };

        // Descriptor last: its presence marks the package complete.
        state.save(request.package_dir)?;

        info!(
            version = %state.version,
            bundles = state.bundles.len(),
            total_size = state.total_size,
            "package organized"
        );

        Ok(state)
    }
}
