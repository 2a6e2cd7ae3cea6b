//! Build-time manifest export and the published manifest pointer.
//!
//! The exporter consumes the authored content description (named groups of
//! entries, each with an address and zero or more labels, declared in a TOML
//! authoring file) and produces the [`ExportedManifest`]: the flat
//! [`PackageEntry`] index, kind and label lookup tables, the logical-hash
//! table keyed by (group, combined labels), and the bundle-identity
//! side-table.
//!
//! The side-table is what lets a runtime bundle file name be attributed back
//! to a trackable logical identity without parsing the name: the mapping is
//! generated deterministically at the same moment the file name is, and ships
//! next to the package.
//!
//! Re-running the exporter over the same authored content is idempotent: all
//! indices are `BTreeMap`s and every key list is sorted, so the serialized
//! output is byte-identical.
//!
//! # Authoring format
//!
//! ```toml
//! [[groups]]
//! name = "core"
//!
//! [[groups.entries]]
//! address = "ui/title_screen"
//! path = "Assets/UI/TitleScreen.prefab"
//! guid = "3f2a..."
//! labels = ["ui", "preload"]
//! ```

mod exporter;

pub use exporter::ManifestExporter;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::version::VersionNumber;

/// Kind assigned to entries that carry no labels.
pub const UNTYPED_KIND: &str = "Untyped";

/// One authored content entry as declared in the authoring file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthoredEntry {
    /// Stable content address (unique within one export)
    pub address: String,
    /// Source asset path, recorded for snapshots
    pub path: String,
    /// Stable asset identifier from the authoring tool
    pub guid: String,
    /// Labels; the first one becomes the entry's kind
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A named group of authored entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthoredGroup {
    /// Group name; becomes the bundle name prefix
    pub name: String,
    /// Entries belonging to this group
    #[serde(default)]
    pub entries: Vec<AuthoredEntry>,
}

/// The authored content set loaded from the authoring file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthoredContent {
    /// All declared groups
    #[serde(default)]
    pub groups: Vec<AuthoredGroup>,
}

/// One addressable content item in the exported index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageEntry {
    /// Content address, unique within one catalog snapshot
    pub key: String,
    /// Derived kind: the first label, or [`UNTYPED_KIND`]
    pub kind: String,
    /// All labels carried by the entry
    pub labels: Vec<String>,
}

/// A (group, combined-label-set) logical identity.
///
/// The string form `group[label_a,label_b]` keys the logical-hash table;
/// labels are sorted so the identity is independent of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalId {
    /// Owning group name
    pub group: String,
    /// Sorted combined label set
    pub labels: Vec<String>,
}

impl LogicalId {
    /// Build an identity from a group and an unsorted label set.
    pub fn new(group: impl Into<String>, mut labels: Vec<String>) -> Self {
        labels.sort();
        labels.dedup();
        Self { group: group.into(), labels }
    }

    /// Stable string key used in serialized tables.
    pub fn key(&self) -> String {
        format!("{}[{}]", self.group, self.labels.join(","))
    }

    /// The deterministic bundle file name for this identity:
    /// `<group>_assets_<labels>.bundle`, lowercase, labels joined with `_`,
    /// `all` when the label set is empty.
    pub fn bundle_file_name(&self) -> String {
        let labels = if self.labels.is_empty() {
            "all".to_string()
        } else {
            self.labels.join("_").to_lowercase()
        };
        format!("{}_assets_{}.bundle", self.group.to_lowercase(), labels)
    }
}

/// Output of one manifest export.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ExportedManifest {
    /// Every addressable item, sorted by key
    pub entries: Vec<PackageEntry>,
    /// kind → sorted keys
    pub by_kind: BTreeMap<String, Vec<String>>,
    /// label → sorted keys
    pub by_label: BTreeMap<String, Vec<String>>,
    /// logical identity key → logical hash over the sorted concatenated
    /// member keys
    pub logical_hashes: BTreeMap<String, String>,
    /// bundle file name → logical hash (the explicit identity side-table)
    pub bundle_identities: BTreeMap<String, String>,
}

impl ExportedManifest {
    /// Canonical file name for the serialized export.
    pub const FILE_NAME: &'static str = "manifest_export.json";

    /// Look up the logical hash for a bundle file name.
    pub fn identity_of(&self, bundle_file_name: &str) -> Option<&str> {
        self.bundle_identities.get(bundle_file_name).map(String::as_str)
    }
}

/// The small, frequently-overwritten pointer record published at the fixed
/// well-known location, telling clients which package directory holds the
/// current version descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestPointer {
    /// Remote directory (relative to the remote root) holding the current
    /// `version_state.json`
    pub latest_package: String,
    /// Version published there
    pub latest_version: VersionNumber,
}

impl ManifestPointer {
    /// File name of the pointer record at the remote root.
    pub const FILE_NAME: &'static str = "manifest.json";
}
