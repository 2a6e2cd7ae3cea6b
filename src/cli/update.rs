//! The `update` command: the client-side update flow.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use crate::catalog::LocalResolver;
use crate::config::Config;
use crate::download::HttpFetcher;
use crate::package::CATALOG_FILE;
use crate::update::{UpdateConfig, UpdateOrchestrator, UpdateOutcome};
use crate::utils::MultiProgress;

/// Check the remote root for a newer content version and apply it.
///
/// The flow is best-effort: any fetch or verification failure leaves the
/// installed content untouched and exits successfully, reporting that the
/// program runs on local content. Only a failure to read the installed
/// content itself is an error.
#[derive(Args)]
pub struct UpdateCommand {
    /// Remote root URL (overrides `remote.url` from the configuration)
    #[arg(long)]
    remote: Option<String>,

    /// Local content root (overrides `local.root`)
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// Staging directory (overrides `local.staging`)
    #[arg(long)]
    staging: Option<PathBuf>,

    /// Maximum concurrent bundle downloads (overrides `update.concurrency`)
    #[arg(long)]
    concurrency: Option<usize>,
}

impl UpdateCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let remote_root = match &self.remote {
            Some(url) => url.clone(),
            None => config.require_remote_url()?.to_string(),
        };
        let local_root = self.local_root.clone().unwrap_or_else(|| config.local.root.clone());
        let staging_root = self.staging.clone().unwrap_or_else(|| config.local.staging.clone());

        let update_config = UpdateConfig {
            remote_root,
            local_root: local_root.clone(),
            staging_root,
            concurrency: self.concurrency.unwrap_or(config.update.concurrency),
        };
        debug!(remote = %update_config.remote_root, local = %local_root.display(), "starting update");

        let installed_catalog = local_root.join(CATALOG_FILE);
        let resolver = if installed_catalog.is_file() {
            LocalResolver::with_base_catalog(installed_catalog)
        } else {
            LocalResolver::new()
        };

        let orchestrator = UpdateOrchestrator::new(update_config, HttpFetcher::new(), resolver)
            .with_progress(MultiProgress::new());

        match orchestrator.run().await? {
            UpdateOutcome::UpToDate => println!("Already up to date"),
            UpdateOutcome::Updated(version) => println!("Updated to {version}"),
            UpdateOutcome::RunLocal(reason) => {
                println!("Update skipped ({reason}); running on installed content");
            }
        }
        Ok(())
    }
}
