//! Shared test fixtures.
//!
//! Available to unit tests and, via the `test-utils` feature, to the
//! integration suite. The centerpiece is [`MemoryFetcher`], an in-memory
//! [`Fetcher`] serving scripted URL → payload responses with per-URL hit
//! counting and failure injection, plus [`RemotePackageBuilder`] which
//! scripts an entire published package (pointer, descriptor, bundles,
//! catalog) with real digests so orchestrator tests exercise the same
//! verification path as production.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::HotpatchError;
use crate::download::{Fetcher, ProgressFn};
use crate::manifest::ManifestPointer;
use crate::package::{BUNDLE_DIR, BundleInfo, CATALOG_FILE, VERSION_STATE_FILE, VersionState};
use crate::version::VersionNumber;

/// Digest of a byte slice in the engine's `sha256:<hex>` notation.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// In-memory [`Fetcher`] over scripted responses.
///
/// URLs not scripted (or explicitly failed) yield
/// [`HotpatchError::NetworkUnavailable`], the same class the production
/// fetcher raises.
#[derive(Default)]
pub struct MemoryFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, String>>,
    text_fetches: AtomicUsize,
    byte_fetches: AtomicUsize,
    byte_delay: Mutex<Option<Duration>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for `url`.
    pub fn stub(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().insert(url.into(), body.into());
    }

    /// Make fetches of `url` fail with the given reason, overriding any stub.
    pub fn fail(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.failures.lock().unwrap().insert(url.into(), reason.into());
    }

    /// Remove a previously-injected failure.
    pub fn heal(&self, url: &str) {
        self.failures.lock().unwrap().remove(url);
    }

    /// Make every subsequent byte fetch sleep for `delay` before delivering,
    /// so a test can interrupt an in-flight download.
    pub fn delay_bytes(&self, delay: Duration) {
        *self.byte_delay.lock().unwrap() = Some(delay);
    }

    /// Number of text (descriptor) fetches made so far.
    pub fn text_fetch_count(&self) -> usize {
        self.text_fetches.load(Ordering::SeqCst)
    }

    /// Number of byte (bundle/catalog) fetches made so far.
    pub fn byte_fetch_count(&self) -> usize {
        self.byte_fetches.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(reason) = self.failures.lock().unwrap().get(url) {
            return Err(HotpatchError::NetworkUnavailable {
                url: url.to_string(),
                reason: reason.clone(),
            }
            .into());
        }
        self.responses.lock().unwrap().get(url).cloned().ok_or_else(|| {
            HotpatchError::NetworkUnavailable {
                url: url.to_string(),
                reason: "no scripted response".to_string(),
            }
            .into()
        })
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        let result = self.lookup(url).and_then(|bytes| Ok(String::from_utf8(bytes)?));
        self.text_fetches.fetch_add(1, Ordering::SeqCst);
        async move { result }
    }

    fn fetch_bytes(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<u64>> + Send {
        let result = self.lookup(url);
        self.byte_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.byte_delay.lock().unwrap();
        let dest = dest.to_path_buf();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let bytes = result?;
            crate::utils::ensure_parent_dir(&dest)?;
            tokio::fs::write(&dest, &bytes).await?;
            if let Some(progress) = progress {
                progress(1.0);
            }
            Ok(bytes.len() as u64)
        }
    }
}

/// Scripts one published package into a [`MemoryFetcher`].
///
/// Produces the full remote layout the orchestrator expects:
///
/// ```text
/// <root>/manifest.json
/// <root>/<package>/version_state.json
/// <root>/<package>/catalog.json
/// <root>/<package>/bundles/<name>.bundle
/// ```
pub struct RemotePackageBuilder {
    root: String,
    package: String,
    version: VersionNumber,
    bundles: Vec<(String, Vec<u8>)>,
    delete_list: Vec<String>,
    catalog: serde_json::Value,
}

impl RemotePackageBuilder {
    pub fn new(root: impl Into<String>, package: impl Into<String>, version: VersionNumber) -> Self {
        Self {
            root: root.into(),
            package: package.into(),
            version,
            bundles: Vec::new(),
            delete_list: Vec::new(),
            catalog: serde_json::json!({ "addresses": {} }),
        }
    }

    pub fn bundle(mut self, name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bundles.push((name.into(), body.into()));
        self
    }

    pub fn delete_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.delete_list.push(prefix.into());
        self
    }

    pub fn catalog_entry(mut self, address: &str, location: &str) -> Self {
        self.catalog["addresses"][address] = serde_json::Value::String(location.to_string());
        self
    }

    /// The version descriptor this builder would publish.
    pub fn version_state(&self) -> VersionState {
        let mut bundles: Vec<BundleInfo> = self
            .bundles
            .iter()
            .map(|(name, body)| BundleInfo {
                bundle_name: name.clone(),
                hash: digest_bytes(body),
                size: body.len() as u64,
                logical_key: name.trim_end_matches(".bundle").to_string(),
            })
            .collect();
        bundles.sort_by(|a, b| a.bundle_name.cmp(&b.bundle_name));

        let rollup = {
            let mut lines: Vec<String> =
                bundles.iter().map(|b| format!("{}:{}", b.bundle_name, b.hash)).collect();
            lines.push(format!("{}:{}", CATALOG_FILE, digest_bytes(&self.catalog_bytes())));
            lines.sort();
            digest_bytes(lines.join("\n").as_bytes())
        };

        VersionState {
            version: self.version,
            hash: rollup,
            total_size: self.bundles.iter().map(|(_, b)| b.len() as u64).sum(),
            bundles,
            delete_list: self.delete_list.clone(),
        }
    }

    fn catalog_bytes(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(&self.catalog).unwrap()
    }

    /// Script every artifact into `fetcher` and return the descriptor.
    pub fn publish(self, fetcher: &MemoryFetcher) -> VersionState {
        let state = self.version_state();
        let root = self.root.trim_end_matches('/');

        let pointer = ManifestPointer {
            latest_package: self.package.clone(),
            latest_version: self.version,
        };
        fetcher.stub(
            format!("{root}/{}", ManifestPointer::FILE_NAME),
            serde_json::to_vec(&pointer).unwrap(),
        );
        fetcher.stub(
            format!("{root}/{}/{}", self.package, VERSION_STATE_FILE),
            serde_json::to_vec_pretty(&state).unwrap(),
        );
        fetcher.stub(format!("{root}/{}/{}", self.package, CATALOG_FILE), self.catalog_bytes());
        for (name, body) in &self.bundles {
            fetcher.stub(format!("{root}/{}/{}/{}", self.package, BUNDLE_DIR, name), body.clone());
        }
        state
    }
}
