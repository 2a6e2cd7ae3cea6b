//! Configuration management for the hotpatch engine.
//!
//! All tunables live in a single TOML file, `hotpatch.toml`, found in the
//! working directory (or at an explicit path passed on the command line).
//! The same file drives both the build-side commands (`export`, `pack`) and
//! the runtime `update` command.
//!
//! ```toml
//! [remote]
//! url = "https://cdn.example.com/content"
//!
//! [local]
//! root = "content/local"
//! staging = "content/staging"
//!
//! [update]
//! concurrency = 4
//!
//! [build]
//! size_limit = 209715200   # bytes; 0 disables the check
//! ```
//!
//! Every section is optional; missing values fall back to the defaults shown
//! above (with `url` empty, which only the `update` command rejects).
//! Command-line flags override file values, which override defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::HotpatchError;

/// Default bundle download parallelism.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default package size threshold: 200 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 200 * 1024 * 1024;

/// Remote endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root URL under which `manifest.json` and package directories are
    /// published
    #[serde(default)]
    pub url: String,
}

/// Local filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// The active content root
    #[serde(default = "LocalConfig::default_root")]
    pub root: PathBuf,
    /// Scratch directory updates download into before promotion
    #[serde(default = "LocalConfig::default_staging")]
    pub staging: PathBuf,
}

impl LocalConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("content/local")
    }

    fn default_staging() -> PathBuf {
        PathBuf::from("content/staging")
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { root: Self::default_root(), staging: Self::default_staging() }
    }
}

/// Runtime update tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Maximum concurrent bundle downloads
    #[serde(default = "UpdateSettings::default_concurrency")]
    pub concurrency: usize,
}

impl UpdateSettings {
    fn default_concurrency() -> usize {
        DEFAULT_CONCURRENCY
    }
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

/// Build-side tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Maximum total bundle size per package, in bytes. `0` disables the
    /// check.
    #[serde(default = "BuildSettings::default_size_limit")]
    pub size_limit: u64,
}

impl BuildSettings {
    fn default_size_limit() -> u64 {
        DEFAULT_SIZE_LIMIT
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self { size_limit: DEFAULT_SIZE_LIMIT }
    }
}

/// The parsed `hotpatch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local filesystem layout
    #[serde(default)]
    pub local: LocalConfig,
    /// Runtime update tunables
    #[serde(default)]
    pub update: UpdateSettings,
    /// Build-side tunables
    #[serde(default)]
    pub build: BuildSettings,
}

impl Config {
    /// Conventional file name, looked up in the working directory.
    pub const FILE_NAME: &'static str = "hotpatch.toml";

    /// Load from an explicit path, or from `./hotpatch.toml` when `path` is
    /// `None`. A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => {
                debug!(path = %explicit.display(), "loading configuration");
                Self::from_file(explicit)
            }
            None => {
                let default = Path::new(Self::FILE_NAME);
                if default.exists() {
                    debug!(path = %default.display(), "loading configuration");
                    Self::from_file(default)
                } else {
                    debug!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let config: Self = crate::utils::read_toml_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency. The remote URL is validated lazily by
    /// [`require_remote_url`](Self::require_remote_url) since build-only
    /// invocations never need one.
    pub fn validate(&self) -> Result<()> {
        if self.local.root == self.local.staging {
            return Err(HotpatchError::ConfigError {
                message: "local.root and local.staging must be different directories".to_string(),
            }
            .into());
        }
        if self.update.concurrency == 0 {
            return Err(HotpatchError::ConfigError {
                message: "update.concurrency must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// The remote root URL, rejecting empty or non-HTTP values.
    pub fn require_remote_url(&self) -> Result<&str> {
        let url = self.remote.url.trim();
        if url.is_empty() {
            return Err(HotpatchError::ConfigError {
                message: "remote.url is not set; add it to hotpatch.toml or pass --remote"
                    .to_string(),
            }
            .into());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HotpatchError::ConfigError {
                message: format!("remote.url must be an http(s) URL, got '{url}'"),
            }
            .into());
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_no_file() {
        let config = Config::default();
        assert_eq!(config.update.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.build.size_limit, DEFAULT_SIZE_LIMIT);
        assert_eq!(config.local.root, PathBuf::from("content/local"));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hotpatch.toml");
        fs::write(
            &path,
            r#"
[remote]
url = "https://cdn.example.com/content"

[update]
concurrency = 8
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.remote.url, "https://cdn.example.com/content");
        assert_eq!(config.update.concurrency, 8);
        assert_eq!(config.build.size_limit, DEFAULT_SIZE_LIMIT);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_same_root_and_staging() {
        let mut config = Config::default();
        config.local.staging = config.local.root.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.update.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_remote_url() {
        let mut config = Config::default();
        assert!(config.require_remote_url().is_err());

        config.remote.url = "ftp://example.com".to_string();
        assert!(config.require_remote_url().is_err());

        config.remote.url = "https://cdn.example.com/content".to_string();
        assert_eq!(config.require_remote_url().unwrap(), "https://cdn.example.com/content");
    }
}
