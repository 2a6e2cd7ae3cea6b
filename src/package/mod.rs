//! Package descriptor types and the build-time organizer.
//!
//! A published package directory has the canonical layout:
//!
//! ```text
//! <root>/catalog.json
//! <root>/bundles/*.bundle
//! <root>/version_state.json
//! ```
//!
//! [`VersionState`] is the authoritative descriptor of one published delta.
//! It is created once per build, immutable after publish, and compared by
//! rollup-hash equality at runtime to decide whether new content exists.

mod organizer;

pub use organizer::{BuildOrganizer, OrganizeRequest};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::version::VersionNumber;

/// Canonical file name of the catalog inside a package directory.
pub const CATALOG_FILE: &str = "catalog.json";
/// Canonical name of the bundle directory inside a package directory.
pub const BUNDLE_DIR: &str = "bundles";
/// Canonical file name of the version descriptor.
pub const VERSION_STATE_FILE: &str = "version_state.json";

/// Logical identity recorded for bundles the export side-table could not
/// attribute.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// One physical artifact file in a package. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleInfo {
    /// File name under `bundles/`
    pub bundle_name: String,
    /// Content digest of the file
    pub hash: String,
    /// Size in bytes
    pub size: u64,
    /// Logical hash attributing this bundle to a manifest identity, or
    /// [`UNKNOWN_IDENTITY`] when the side-table had no entry
    pub logical_key: String,
}

/// The authoritative descriptor of one published delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionState {
    /// Package version
    pub version: VersionNumber,
    /// Rollup digest over the whole package directory, excluding this
    /// descriptor file itself
    pub hash: String,
    /// Sum of all bundle sizes in bytes
    pub total_size: u64,
    /// Every bundle required by this version
    pub bundles: Vec<BundleInfo>,
    /// Bundle-name prefixes superseded by this version and deleted locally
    /// at promotion
    pub delete_list: Vec<String>,
}

impl VersionState {
    /// Read a descriptor from `dir/version_state.json`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        crate::utils::read_json_file(&dir.join(VERSION_STATE_FILE))
    }

    /// Parse a descriptor from JSON text (as fetched from the remote host).
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).map_err(Into::into)
    }

    /// Write the descriptor into `dir` as the canonical file.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        crate::utils::write_json_file(&dir.join(VERSION_STATE_FILE), self, true)
    }

    /// Path of the bundle directory under a package root.
    pub fn bundle_dir(root: &Path) -> PathBuf {
        root.join(BUNDLE_DIR)
    }
}
