//! Package version numbering and the persisted build-time version store.
//!
//! [`VersionNumber`] is a plain ordered triple, not a semver range: the only
//! semantic the runtime cares about is whether the `major` component differs
//! (incompatible break, full local wipe) versus an incremental minor/patch
//! bump. The wire format is a JSON object `{major, minor, patch}` shared by
//! the manifest pointer and the version descriptor.
//!
//! [`VersionStore`] persists the monotonic version and a build counter in the
//! build workspace. Increment operations run only at build time; the runtime
//! never writes here.

mod store;

pub use store::VersionStore;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonic package version, totally ordered by major, then minor, then
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionNumber {
    /// Incompatible-break component; a difference forces a full local wipe
    pub major: u32,
    /// Feature component
    pub minor: u32,
    /// Hotfix component
    pub patch: u32,
}

impl VersionNumber {
    /// Construct a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Whether updating from `self` to `other` (or vice versa) crosses a
    /// major boundary and therefore requires wiping the local content root.
    pub fn is_breaking_change(&self, other: &Self) -> bool {
        self.major != other.major
    }

    /// Next patch version.
    pub fn bump_patch(self) -> Self {
        Self { patch: self.patch + 1, ..self }
    }

    /// Next minor version; resets patch.
    pub fn bump_minor(self) -> Self {
        Self { minor: self.minor + 1, patch: 0, ..self }
    }

    /// Next major version; resets minor and patch.
    pub fn bump_major(self) -> Self {
        Self { major: self.major + 1, minor: 0, patch: 0 }
    }
}

impl Default for VersionNumber {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
