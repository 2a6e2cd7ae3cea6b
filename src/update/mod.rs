//! The runtime update orchestrator.
//!
//! One logical update flow runs per program start, driving the state machine
//!
//! ```text
//! Bootstrapping → CheckingManifest → ComparingVersions → Downloading
//!     → Staged → Promoted → CatalogMerged
//! ```
//!
//! with early exits to `RunLocal` whenever a required fetch fails: the update
//! is best-effort and never blocks startup. The local content root is the
//! single mutable shared resource; only [`StagingPromoter`] touches it, and
//! only after every bundle in the batch downloaded and re-verified. Bundles,
//! catalog, and descriptor become visible as one unit at promotion.
//!
//! Concurrency and cancellation:
//! - bundle downloads fan out up to `concurrency` at a time and join before
//!   the catalog phase
//! - the whole flow is guarded by an exclusive [`UpdateLock`]; a second
//!   concurrent run fails fast
//! - the [`CancellationToken`] is honored at every suspension point before
//!   promotion; cancellation before promote leaves the local root untouched,
//!   and promotion itself is non-cancellable
//!
//! Other subsystems wait on the readiness signal ([`subscribe`]) before
//! issuing content loads; it fires on every non-fatal path, whether or not
//! new content was applied.
//!
//! [`subscribe`]: UpdateOrchestrator::subscribe

mod lock;

pub use lock::UpdateLock;

use anyhow::{Context, Result};
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogHandle, CatalogMerger, ContentResolver};
use crate::core::HotpatchError;
use crate::download::{Fetcher, ProgressFn};
use crate::manifest::ManifestPointer;
use crate::package::{BUNDLE_DIR, BundleInfo, CATALOG_FILE, VERSION_STATE_FILE, VersionState};
use crate::staging::StagingPromoter;
use crate::utils::progress::MultiProgress;
use crate::version::VersionNumber;

/// States of the update flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Initializing the content-resolution layer with installed content
    Bootstrapping,
    /// Fetching the well-known manifest pointer
    CheckingManifest,
    /// Fetching and comparing the remote version descriptor
    ComparingVersions,
    /// Fan-out bundle downloads plus catalog into staging
    Downloading,
    /// Staging fully populated and verified
    Staged,
    /// Staging applied to the local root
    Promoted,
    /// Promoted catalog merged into the resolver
    CatalogMerged,
    /// Running on whatever is already installed
    RunLocal,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bootstrapping => "Bootstrapping",
            Self::CheckingManifest => "CheckingManifest",
            Self::ComparingVersions => "ComparingVersions",
            Self::Downloading => "Downloading",
            Self::Staged => "Staged",
            Self::Promoted => "Promoted",
            Self::CatalogMerged => "CatalogMerged",
            Self::RunLocal => "RunLocal",
        };
        f.write_str(name)
    }
}

/// How one update run ended. Every variant leaves the program able to load
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Remote rollup hash equals the local one; nothing downloaded
    UpToDate,
    /// New content promoted and merged
    Updated(VersionNumber),
    /// Update skipped or aborted; running on installed content
    RunLocal(String),
}

/// Configuration for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Remote root URL under which `manifest.json` is published
    pub remote_root: String,
    /// Local content root (the active content set)
    pub local_root: PathBuf,
    /// Staging directory; must be on the same filesystem as `local_root`
    /// for promotion moves to be cheap
    pub staging_root: PathBuf,
    /// Maximum concurrent bundle downloads
    pub concurrency: usize,
}

impl UpdateConfig {
    fn remote_url(&self, segments: &[&str]) -> String {
        let mut url = self.remote_root.trim_end_matches('/').to_string();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }
}

/// Drives one update flow per program start.
///
/// Generic over the [`Fetcher`] (production: HTTP) and the host's
/// [`ContentResolver`]. The merged catalog handle is owned here and kept
/// alive for the remainder of the run; dropping the orchestrator unloads the
/// merged content.
pub struct UpdateOrchestrator<F: Fetcher, R: ContentResolver> {
    config: UpdateConfig,
    fetcher: F,
    resolver: R,
    cancel: CancellationToken,
    ready_tx: watch::Sender<bool>,
    state: Mutex<UpdateState>,
    merged_catalog: Mutex<Option<CatalogHandle>>,
    progress: Option<MultiProgress>,
}

impl<F: Fetcher, R: ContentResolver> UpdateOrchestrator<F, R> {
    /// Create an orchestrator. Nothing happens until [`run`](Self::run).
    pub fn new(config: UpdateConfig, fetcher: F, resolver: R) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            config,
            fetcher,
            resolver,
            cancel: CancellationToken::new(),
            ready_tx,
            state: Mutex::new(UpdateState::Bootstrapping),
            merged_catalog: Mutex::new(None),
            progress: None,
        }
    }

    /// Attach progress reporting for bundle downloads.
    #[must_use]
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token cancelling the flow at the next suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The readiness signal other subsystems await before issuing content
    /// loads. Becomes `true` exactly once per run, on every non-fatal path.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// The resolver this orchestrator bootstrapped and merged into.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The fetcher backing this orchestrator.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// State the flow most recently entered.
    pub fn current_state(&self) -> UpdateState {
        *self.state.lock().expect("state poisoned")
    }

    /// Whether a merged catalog is currently held alive.
    pub fn has_merged_catalog(&self) -> bool {
        self.merged_catalog.lock().expect("state poisoned").is_some()
    }

    /// Run the update flow once.
    ///
    /// # Errors
    ///
    /// Only two classes propagate: failure to initialize the resolver with
    /// the installed content (the program cannot load anything), and failure
    /// during or after promotion (the local root may be half-applied; the
    /// surviving staging directory marks it for recovery next start). Every
    /// fetch, parse, or verification failure collapses into
    /// [`UpdateOutcome::RunLocal`].
    pub async fn run(&self) -> Result<UpdateOutcome> {
        let _lock = UpdateLock::acquire(&self.config.local_root).await?;

        self.set_state(UpdateState::Bootstrapping);
        self.resolver
            .initialize()
            .await
            .context("Failed to initialize content resolver with installed content")?;

        // A leftover staging root is an update that died mid-flight; its
        // contents cannot be trusted, so discard and start clean. A failed
        // discard skips the update, not the startup; the directory stays for
        // the next attempt.
        let outcome = match self.discard_stale_staging() {
            Err(e) => {
                warn!(error = %e, "stale staging could not be discarded, skipping update");
                UpdateOutcome::RunLocal(format!("stale staging could not be discarded: {e:#}"))
            }
            Ok(()) => match self.try_update().await {
                Ok(outcome) => outcome,
                Err(e) => match e.downcast_ref::<HotpatchError>() {
                    Some(hp) if hp.is_recoverable() => {
                        warn!(error = %hp, "update aborted, continuing with local content");
                        self.scrub_staging();
                        UpdateOutcome::RunLocal(hp.to_string())
                    }
                    _ => return Err(e),
                },
            },
        };

        if matches!(outcome, UpdateOutcome::RunLocal(_) | UpdateOutcome::UpToDate) {
            self.set_state(UpdateState::RunLocal);
        }

        // Readiness fires regardless of which way the flow ended.
        let _ = self.ready_tx.send(true);
        info!(outcome = ?outcome, "update flow finished");
        Ok(outcome)
    }

    /// Run `fut` unless the cancellation token fires first. `None` means the
    /// flow was cancelled and `fut` was dropped at whatever await it had
    /// reached.
    async fn until_cancelled<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        match self.cancel.run_until_cancelled(fut).await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    async fn try_update(&self) -> Result<UpdateOutcome> {
        let cancelled = || UpdateOutcome::RunLocal("update cancelled".into());
        if self.cancel.is_cancelled() {
            return Ok(cancelled());
        }

        self.set_state(UpdateState::CheckingManifest);
        let Some(pointer) = self.until_cancelled(self.fetch_manifest_pointer()).await? else {
            return Ok(cancelled());
        };

        self.set_state(UpdateState::ComparingVersions);
        let Some(remote) = self.until_cancelled(self.fetch_remote_state(&pointer)).await? else {
            return Ok(cancelled());
        };
        let local = self.load_local_state();

        if let Some(local) = &local
            && local.hash == remote.hash
        {
            debug!(hash = %local.hash, "rollup hashes equal, nothing to update");
            return Ok(UpdateOutcome::UpToDate);
        }

        let breaking = local
            .as_ref()
            .is_some_and(|l| l.version.is_breaking_change(&remote.version));
        if self.cancel.is_cancelled() {
            return Ok(cancelled());
        }
        if breaking {
            info!(
                local = %local.as_ref().map(|l| l.version.to_string()).unwrap_or_default(),
                remote = %remote.version,
                "major version change, wiping local content root"
            );
            let root = self.config.local_root.clone();
            tokio::task::spawn_blocking(move || StagingPromoter::wipe_all(&root))
                .await
                .context("Wipe task panicked")??;
        }

        self.set_state(UpdateState::Downloading);
        let staged = self
            .until_cancelled(self.download_into_staging(&pointer, &remote))
            .await?;
        if staged.is_none() {
            // In-flight downloads were dropped mid-transfer; nothing partial
            // may survive.
            self.scrub_staging();
            return Ok(cancelled());
        }

        self.set_state(UpdateState::Staged);

        // Promotion is non-cancellable from here on.
        let delete_list = remote.delete_list.clone();
        let staging = self.config.staging_root.clone();
        let local_root = self.config.local_root.clone();
        tokio::task::spawn_blocking(move || {
            StagingPromoter::promote(&delete_list, &staging, &local_root)
        })
        .await
        .context("Promotion task panicked")??;
        self.set_state(UpdateState::Promoted);

        let handle = CatalogMerger::merge(
            &self.resolver,
            &self.config.local_root.join(CATALOG_FILE),
            &self.config.local_root,
        )
        .await?;
        *self.merged_catalog.lock().expect("state poisoned") = Some(handle);
        self.set_state(UpdateState::CatalogMerged);

        Ok(UpdateOutcome::Updated(remote.version))
    }

    async fn fetch_manifest_pointer(&self) -> Result<ManifestPointer> {
        let url = self.config.remote_url(&[ManifestPointer::FILE_NAME]);
        let text = self.fetcher.fetch_text(&url).await?;
        serde_json::from_str(&text).map_err(|e| {
            HotpatchError::MalformedDescriptor {
                what: "manifest pointer".into(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn fetch_remote_state(&self, pointer: &ManifestPointer) -> Result<VersionState> {
        let url = self.config.remote_url(&[&pointer.latest_package, VERSION_STATE_FILE]);
        let text = self.fetcher.fetch_text(&url).await?;
        VersionState::from_json(&text).map_err(|e| {
            HotpatchError::MalformedDescriptor { what: "version state".into(), reason: e.to_string() }
                .into()
        })
    }

    fn load_local_state(&self) -> Option<VersionState> {
        match VersionState::load(&self.config.local_root) {
            Ok(state) => Some(state),
            Err(_) => {
                debug!("no local version state, treating as fresh install");
                None
            }
        }
    }

    /// Download all bundles concurrently, then the catalog, then persist the
    /// verified remote descriptor, in that order, so the descriptor's
    /// presence in staging implies the rest of staging is complete.
    async fn download_into_staging(
        &self,
        pointer: &ManifestPointer,
        remote: &VersionState,
    ) -> Result<()> {
        let staging_bundles = self.config.staging_root.join(BUNDLE_DIR);
        crate::utils::ensure_dir(&staging_bundles)?;

        let mut downloads = futures::stream::iter(remote.bundles.iter().map(|bundle| {
            let dest = staging_bundles.join(&bundle.bundle_name);
            self.download_and_verify(pointer, bundle, dest)
        }))
        .buffer_unordered(self.config.concurrency.max(1));

        while let Some(result) = downloads.next().await {
            // Any failed bundle aborts the whole update; the caller scrubs
            // staging so nothing partial survives.
            result?;
        }
        drop(downloads);

        let catalog_url = self.config.remote_url(&[&pointer.latest_package, CATALOG_FILE]);
        self.fetcher
            .fetch_bytes(&catalog_url, &self.config.staging_root.join(CATALOG_FILE), None)
            .await?;

        remote.save(&self.config.staging_root)?;
        Ok(())
    }

    async fn download_and_verify(
        &self,
        pointer: &ManifestPointer,
        bundle: &BundleInfo,
        dest: PathBuf,
    ) -> Result<()> {
        let url = self.config.remote_url(&[
            &pointer.latest_package,
            BUNDLE_DIR,
            &bundle.bundle_name,
        ]);

        let progress: Option<ProgressFn> = self.progress.as_ref().map(|multi| {
            let bar = multi.add_download(bundle.size);
            bar.set_prefix(bundle.bundle_name.clone());
            let size = bundle.size;
            Arc::new(move |fraction: f64| {
                bar.set_position((fraction * size as f64) as u64);
            }) as ProgressFn
        });

        self.fetcher.fetch_bytes(&url, &dest, progress).await?;

        let expected = bundle.hash.clone();
        let verify_path = dest.clone();
        let actual = tokio::task::spawn_blocking(move || crate::hash::hash_file(&verify_path))
            .await
            .context("Hash task panicked")??;

        if actual.to_lowercase() != expected.to_lowercase() {
            return Err(HotpatchError::HashMismatch {
                bundle: bundle.bundle_name.clone(),
                expected,
                actual,
            }
            .into());
        }

        debug!(bundle = %bundle.bundle_name, "downloaded and verified");
        Ok(())
    }

    fn discard_stale_staging(&self) -> Result<()> {
        let staging = &self.config.staging_root;
        if staging.exists() {
            warn!(
                staging = %staging.display(),
                "found staging directory from an incomplete update, discarding"
            );
            std::fs::remove_dir_all(staging).with_context(|| {
                format!("Failed to discard stale staging: {}", staging.display())
            })?;
        }
        Ok(())
    }

    fn scrub_staging(&self) {
        if self.config.staging_root.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.config.staging_root)
        {
            warn!(error = %e, "failed to clean staging after aborted update");
        }
    }

    fn set_state(&self, state: UpdateState) {
        debug!(state = %state, "update state");
        *self.state.lock().expect("state poisoned") = state;
    }
}
