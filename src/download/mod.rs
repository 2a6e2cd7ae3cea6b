//! Artifact fetching over HTTP(S).
//!
//! [`Fetcher`] is the seam between the update orchestrator and the network:
//! one text fetch and one save-to-disk byte fetch, single attempt each, no
//! retry. A failed fetch means "this artifact is unavailable this run"; the
//! orchestrator decides what that implies for the update as a whole.
//!
//! [`HttpFetcher`] is the production implementation over [`reqwest`]. Byte
//! downloads stream into a `.part` sibling and are renamed into place only
//! on success, so a failed transfer never leaves a partial file at the
//! destination. Fractional progress is reported through an optional callback
//! as chunks arrive.

use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::HotpatchError;
use crate::utils::ensure_parent_dir;

/// Fractional progress callback; invoked with values in `0.0..=1.0` when the
/// total size is known, and with `0.0` otherwise until completion.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Single-attempt artifact transfer.
pub trait Fetcher: Send + Sync {
    /// Fetch a small text payload (manifest pointer, version descriptor).
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send;

    /// Fetch a binary payload to `dest`, returning the byte count.
    ///
    /// On failure no file exists at `dest` afterwards.
    fn fetch_bytes(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Production fetcher over a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    fn network_error(url: &str, reason: impl ToString) -> anyhow::Error {
        HotpatchError::NetworkUnavailable { url: url.to_string(), reason: reason.to_string() }
            .into()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            debug!(url = %url, "fetching text");
            let response =
                client.get(&url).send().await.map_err(|e| Self::network_error(&url, e))?;

            if !response.status().is_success() {
                return Err(Self::network_error(&url, format!("HTTP {}", response.status())));
            }

            response.text().await.map_err(|e| Self::network_error(&url, e))
        }
    }

    fn fetch_bytes(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<u64>> + Send {
        let client = self.client.clone();
        let url = url.to_string();
        let dest = dest.to_path_buf();
        async move {
            debug!(url = %url, dest = %dest.display(), "fetching bytes");
            ensure_parent_dir(&dest)?;

            let part = dest.with_extension("part");
            let result = stream_to_file(&client, &url, &part, progress).await;

            match result {
                Ok(written) => {
                    tokio::fs::rename(&part, &dest)
                        .await
                        .map_err(|e| Self::network_error(&url, e))?;
                    Ok(written)
                }
                Err(e) => {
                    // No partial file left in place.
                    if tokio::fs::remove_file(&part).await.is_err() {
                        debug!(part = %part.display(), "no partial file to clean up");
                    } else {
                        warn!(url = %url, "removed partial download");
                    }
                    Err(e)
                }
            }
        }
    }
}

async fn stream_to_file(
    client: &reqwest::Client,
    url: &str,
    part: &Path,
    progress: Option<ProgressFn>,
) -> Result<u64> {
    use tokio::io::AsyncWriteExt;

    let mut response =
        client.get(url).send().await.map_err(|e| HttpFetcher::network_error(url, e))?;

    if !response.status().is_success() {
        return Err(HttpFetcher::network_error(url, format!("HTTP {}", response.status())));
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| HttpFetcher::network_error(url, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) =
        response.chunk().await.map_err(|e| HttpFetcher::network_error(url, e))?
    {
        file.write_all(&chunk).await.map_err(|e| HttpFetcher::network_error(url, e))?;
        written += chunk.len() as u64;
        if let Some(progress) = &progress {
            let fraction = match total {
                Some(total) if total > 0 => (written as f64 / total as f64).min(1.0),
                _ => 0.0,
            };
            progress(fraction);
        }
    }

    file.sync_all().await.map_err(|e| HttpFetcher::network_error(url, e))?;
    if let Some(progress) = &progress {
        progress(1.0);
    }
    Ok(written)
}
