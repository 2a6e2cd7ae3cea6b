//! Persistence for the build-time version counters.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::VersionNumber;
use crate::utils::{read_json_file, write_json_file};

/// State persisted by the [`VersionStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredVersion {
    version: VersionNumber,
    build_counter: u64,
}

impl Default for StoredVersion {
    fn default() -> Self {
        Self { version: VersionNumber::default(), build_counter: 0 }
    }
}

/// Persists the monotonic [`VersionNumber`] and build counter in the build
/// workspace.
///
/// Loaded lazily from `version_store.json`; a missing file yields the default
/// `1.0.0` / counter `0`. Every mutation is written back atomically before
/// the call returns, so a crashed build never loses a bump it reported.
///
/// Used exclusively at build time by the `pack` command.
pub struct VersionStore {
    path: PathBuf,
    state: StoredVersion,
}

impl VersionStore {
    /// File name under the build workspace.
    pub const FILE_NAME: &'static str = "version_store.json";

    /// Load the store from `workspace`, creating default state if absent.
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = workspace.join(Self::FILE_NAME);
        let state = if path.exists() {
            read_json_file(&path)?
        } else {
            debug!("No version store at {}, starting at 1.0.0", path.display());
            StoredVersion::default()
        };
        Ok(Self { path, state })
    }

    /// The current version.
    pub fn version(&self) -> VersionNumber {
        self.state.version
    }

    /// Total number of builds recorded.
    pub fn build_counter(&self) -> u64 {
        self.state.build_counter
    }

    /// Bump the patch component and persist.
    pub fn increment_patch(&mut self) -> Result<VersionNumber> {
        self.state.version = self.state.version.bump_patch();
        self.save()?;
        Ok(self.state.version)
    }

    /// Bump the minor component (resets patch) and persist.
    pub fn increment_minor(&mut self) -> Result<VersionNumber> {
        self.state.version = self.state.version.bump_minor();
        self.save()?;
        Ok(self.state.version)
    }

    /// Bump the major component (resets minor and patch) and persist.
    pub fn increment_major(&mut self) -> Result<VersionNumber> {
        self.state.version = self.state.version.bump_major();
        self.save()?;
        Ok(self.state.version)
    }

    /// Record one completed build and persist.
    pub fn record_build(&mut self) -> Result<u64> {
        self.state.build_counter += 1;
        self.save()?;
        Ok(self.state.build_counter)
    }

    /// Persist `version` as the new current version and record one completed
    /// build, in a single write.
    ///
    /// The `pack` command computes the prospective version up front but calls
    /// this only once the package descriptor exists, so a failed build never
    /// consumes a version number.
    pub fn commit_build(&mut self, version: VersionNumber) -> Result<u64> {
        self.state.version = version;
        self.state.build_counter += 1;
        self.save()?;
        Ok(self.state.build_counter)
    }

    fn save(&self) -> Result<()> {
        write_json_file(&self.path, &self.state, true)
    }
}
