//! Content fingerprinting for bundles and packages.
//!
//! Every digest this crate produces is SHA-256 rendered as
//! `"sha256:<lowercase hex>"`. Three operations cover all call sites:
//!
//! - [`hash_file`] - per-bundle content digest recorded in `BundleInfo`
//! - [`hash_string`] - logical hashes over sorted key concatenations
//! - [`hash_directory`] - the package rollup hash used for change detection
//!
//! The rollup is order-independent with respect to filesystem enumeration:
//! per-file digests are aggregated sorted by normalized relative path, so two
//! packages with byte-identical content always hash equal, on any platform.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::utils::normalize_path_for_storage;

/// Compute the SHA-256 digest of a file's content.
///
/// Deterministic for identical bytes. An unreadable file is an error; no
/// partial digest is ever returned.
///
/// # Examples
///
/// ```rust,no_run
/// use hotpatch_cli::hash::hash_file;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let digest = hash_file(Path::new("bundles/core_assets_all.bundle"))?;
/// assert!(digest.starts_with("sha256:"));
/// # Ok(())
/// # }
/// ```
pub fn hash_file(path: &Path) -> Result<String> {
    let content = fs::read(path).with_context(|| {
        format!(
            "Cannot read file for hashing: {}\n\nCheck that the file exists and is readable",
            path.display()
        )
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&content);
    let result = hasher.finalize();

    Ok(format!("sha256:{}", hex::encode(result)))
}

/// Compute the digest of a UTF-8 string.
///
/// Used for logical/group hashes computed from sorted key concatenation.
pub fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Compute the rollup digest of a directory tree.
///
/// Walks `dir` recursively, skipping any file whose name equals `exclude`
/// (the descriptor file must not hash itself), computes [`hash_file`] per
/// entry, sorts the `(relative path, digest)` pairs by path, and hashes the
/// `path:digest\n` concatenation.
///
/// # Errors
///
/// Any unreadable entry aborts the whole operation; no partial rollup is
/// returned.
pub fn hash_directory(dir: &Path, exclude: &str) -> Result<String> {
    let mut file_hashes: Vec<(String, String)> = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry
            .with_context(|| format!("Failed to read directory entry in: {}", dir.display()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let file_path = entry.path();
        if entry.file_name().to_string_lossy() == exclude {
            continue;
        }

        let relative_path =
            normalize_path_for_storage(file_path.strip_prefix(dir).unwrap_or(file_path));
        let digest = hash_file(file_path)?;
        file_hashes.push((relative_path, digest));
    }

    // Sort by relative path for deterministic ordering
    file_hashes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (path, digest) in &file_hashes {
        hasher.update(format!("{path}:{digest}\n").as_bytes());
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Verify a file against an expected digest.
///
/// Comparison is case-insensitive on the hex portion.
pub fn verify_file(path: &Path, expected: &str) -> Result<bool> {
    let actual = hash_file(path)?;
    Ok(actual.to_lowercase() == expected.to_lowercase())
}
