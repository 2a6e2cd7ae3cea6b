//! The `status` command: inspect the installed content set.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::Config;
use crate::download::{Fetcher, HttpFetcher};
use crate::hash::verify_file;
use crate::manifest::ManifestPointer;
use crate::package::{BUNDLE_DIR, VERSION_STATE_FILE, VersionState};

/// Show the installed content version, its bundles, and any leftover
/// staging directory. `--verify` re-hashes every installed bundle against
/// the descriptor; `--check-remote` also fetches the published descriptor
/// and compares rollup hashes.
#[derive(Args)]
pub struct StatusCommand {
    /// Local content root (overrides `local.root`)
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// Re-hash every installed bundle against the descriptor
    #[arg(long)]
    verify: bool,

    /// Also fetch the remote manifest and report whether an update is
    /// available
    #[arg(long)]
    check_remote: bool,
}

impl StatusCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let local_root = self.local_root.clone().unwrap_or_else(|| config.local.root.clone());

        let local = match VersionState::load(&local_root) {
            Ok(state) => {
                println!("Installed version: {}", state.version);
                println!("Bundles: {} ({} bytes)", state.bundles.len(), state.total_size);
                for bundle in &state.bundles {
                    println!("  {} ({} bytes)", bundle.bundle_name, bundle.size);
                }
                Some(state)
            }
            Err(_) => {
                println!("No content installed at {}", local_root.display());
                None
            }
        };

        if self.verify
            && let Some(state) = &local
        {
            self.verify_bundles(&local_root, state)?;
        }

        if config.local.staging.exists() {
            println!(
                "Incomplete update staged at {} (will be discarded on next update)",
                config.local.staging.display()
            );
        }

        if self.check_remote {
            self.report_remote(config, local.as_ref()).await?;
        }
        Ok(())
    }

    fn verify_bundles(&self, local_root: &std::path::Path, state: &VersionState) -> Result<()> {
        let bundle_dir = local_root.join(BUNDLE_DIR);
        let mut corrupt = 0usize;
        for bundle in &state.bundles {
            let path = bundle_dir.join(&bundle.bundle_name);
            if verify_file(&path, &bundle.hash)? {
                println!("  {} ok", bundle.bundle_name);
            } else {
                corrupt += 1;
                println!("  {} CORRUPT", bundle.bundle_name);
            }
        }
        if corrupt > 0 {
            anyhow::bail!("{corrupt} bundle(s) failed verification; run `hotpatch update`");
        }
        Ok(())
    }

    async fn report_remote(&self, config: &Config, local: Option<&VersionState>) -> Result<()> {
        let root = config.require_remote_url()?.trim_end_matches('/').to_string();
        let fetcher = HttpFetcher::new();

        let pointer_url = format!("{root}/{}", ManifestPointer::FILE_NAME);
        let pointer: ManifestPointer = serde_json::from_str(&fetcher.fetch_text(&pointer_url).await?)?;
        println!("Published version: {}", pointer.latest_version);

        let state_url = format!("{root}/{}/{}", pointer.latest_package, VERSION_STATE_FILE);
        let remote = VersionState::from_json(&fetcher.fetch_text(&state_url).await?)?;

        println!("{}", remote_comparison(local, &remote));
        Ok(())
    }
}

/// The verdict line for `--check-remote`. Decided by rollup hash equality,
/// the same criterion the update flow uses, so a republished same-version
/// package with different content still reports as an available update.
fn remote_comparison(local: Option<&VersionState>, remote: &VersionState) -> &'static str {
    match local {
        Some(local) if local.hash == remote.hash => "Up to date",
        Some(local) if local.version.is_breaking_change(&remote.version) => {
            "Update available (requires full reinstall of local content)"
        }
        Some(_) | None => "Update available",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionNumber;

    fn state(version: VersionNumber, hash: &str) -> VersionState {
        VersionState {
            version,
            hash: hash.to_string(),
            total_size: 0,
            bundles: Vec::new(),
            delete_list: Vec::new(),
        }
    }

    #[test]
    fn test_equal_hashes_are_up_to_date() {
        let local = state(VersionNumber::new(1, 0, 1), "sha256:aa");
        let remote = state(VersionNumber::new(1, 0, 1), "sha256:aa");
        assert_eq!(remote_comparison(Some(&local), &remote), "Up to date");
    }

    #[test]
    fn test_republished_same_version_with_new_content_is_an_update() {
        let local = state(VersionNumber::new(1, 0, 1), "sha256:aa");
        let remote = state(VersionNumber::new(1, 0, 1), "sha256:bb");
        assert_eq!(remote_comparison(Some(&local), &remote), "Update available");
    }

    #[test]
    fn test_major_jump_warns_about_reinstall() {
        let local = state(VersionNumber::new(1, 4, 2), "sha256:aa");
        let remote = state(VersionNumber::new(2, 0, 0), "sha256:bb");
        assert_eq!(
            remote_comparison(Some(&local), &remote),
            "Update available (requires full reinstall of local content)"
        );
    }

    #[test]
    fn test_nothing_installed_is_an_update() {
        let remote = state(VersionNumber::new(1, 0, 0), "sha256:aa");
        assert_eq!(remote_comparison(None, &remote), "Update available");
    }
}
