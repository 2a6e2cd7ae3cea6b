//! Build snapshots: the historical record of authored assets per release.
//!
//! Each build records a [`BuildSnapshot`] of exactly which authored assets
//! existed (pre-bundling), keyed by address with per-asset content hashes.
//! Snapshots form an append-only, singly-linked history with one designated
//! head (the last fully-released version) and at most one staged snapshot
//! (built but not yet confirmed live).
//!
//! Diffing consecutive snapshots yields the changed-asset list and the
//! `delete_list` published in the next version descriptor. An address whose
//! group membership changed between snapshots is treated as removed from the
//! old group plus added to the new group, so the old group's bundles are
//! superseded.

mod history;

pub use history::SnapshotHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::manifest::{AuthoredContent, LogicalId};
use crate::version::VersionNumber;

/// One authored asset as recorded at build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetSnapshot {
    /// Content address
    pub address: String,
    /// Source asset path
    pub path: String,
    /// Stable asset identifier from the authoring tool
    pub guid: String,
    /// Owning group at the time of this build
    pub group_name: String,
    /// Labels at the time of this build
    pub labels: Vec<String>,
    /// Content digest of the source asset
    pub file_hash: String,
}

/// The per-release record of authored assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildSnapshot {
    /// Version this snapshot was built for
    pub version: VersionNumber,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Every authored asset in this release
    pub assets: Vec<AssetSnapshot>,
    /// Delete list computed against the previous head
    pub delete_list: Vec<String>,
}

impl BuildSnapshot {
    /// Record a snapshot of the authored content, hashing nothing: callers
    /// supply per-asset hashes (typically [`crate::hash::hash_file`] over
    /// the source paths, or authoring-tool metadata when sources are not on
    /// disk).
    pub fn capture(
        version: VersionNumber,
        content: &AuthoredContent,
        hashes: &BTreeMap<String, String>,
    ) -> Self {
        let mut assets: Vec<AssetSnapshot> = Vec::new();
        for group in &content.groups {
            for entry in &group.entries {
                assets.push(AssetSnapshot {
                    address: entry.address.clone(),
                    path: entry.path.clone(),
                    guid: entry.guid.clone(),
                    group_name: group.name.clone(),
                    labels: entry.labels.clone(),
                    file_hash: hashes.get(&entry.address).cloned().unwrap_or_default(),
                });
            }
        }
        assets.sort_by(|a, b| a.address.cmp(&b.address));

        Self { version, timestamp: Utc::now(), assets, delete_list: Vec::new() }
    }
}

/// Result of diffing two consecutive snapshots, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Addresses present only in the newer snapshot
    pub added: Vec<String>,
    /// Addresses present in both with a different `file_hash`, or whose
    /// group membership moved (recorded here under the new group)
    pub changed: Vec<String>,
    /// Addresses present only in the older snapshot, plus the old-group
    /// side of every group move
    pub removed: Vec<String>,
}

/// Diff `previous` against `next`.
///
/// A group move counts as removed-from-old-group and added-to-new-group: the
/// address appears in both `removed` and `changed`, and the old group's
/// bundles are superseded.
pub fn diff(previous: &BuildSnapshot, next: &BuildSnapshot) -> SnapshotDiff {
    let old: BTreeMap<&str, &AssetSnapshot> =
        previous.assets.iter().map(|a| (a.address.as_str(), a)).collect();
    let new: BTreeMap<&str, &AssetSnapshot> =
        next.assets.iter().map(|a| (a.address.as_str(), a)).collect();

    let mut diff = SnapshotDiff::default();

    for (address, asset) in &new {
        match old.get(address) {
            None => diff.added.push((*address).to_string()),
            Some(prev) => {
                if prev.group_name != asset.group_name {
                    // Group move: delete from the old group, add to the new.
                    diff.removed.push((*address).to_string());
                    diff.changed.push((*address).to_string());
                } else if prev.file_hash != asset.file_hash {
                    diff.changed.push((*address).to_string());
                }
            }
        }
    }

    for address in old.keys() {
        if !new.contains_key(address) {
            diff.removed.push((*address).to_string());
        }
    }

    diff.added.sort();
    diff.changed.sort();
    diff.removed.sort();
    diff.removed.dedup();
    diff
}

/// Derive the delete list for the next version descriptor.
///
/// Returns the bundle-name prefixes (`<group>_assets_`) of every group that
/// an asset left between the two snapshots, whether by deletion or by moving
/// to another group. Those bundles are superseded and must be removed from
/// local installs at promotion.
pub fn delete_list_from_diff(previous: &BuildSnapshot, next: &BuildSnapshot) -> Vec<String> {
    let d = diff(previous, next);
    let removed: BTreeSet<&str> = d.removed.iter().map(String::as_str).collect();

    let mut prefixes: BTreeSet<String> = BTreeSet::new();
    for asset in &previous.assets {
        if removed.contains(asset.address.as_str()) {
            let id = LogicalId::new(&asset.group_name, asset.labels.clone());
            // Prefix rather than the exact file name: every variant bundle of
            // the superseded group goes.
            let file = id.bundle_file_name();
            let prefix = file.split("_assets_").next().unwrap_or(&file).to_string();
            prefixes.insert(format!("{prefix}_assets_"));
        }
    }
    prefixes.into_iter().collect()
}
