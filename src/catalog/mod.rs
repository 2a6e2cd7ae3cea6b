//! Catalog merging and the content-resolution collaborator seam.
//!
//! The host's content-resolution layer is external; the engine depends on
//! exactly three operations, captured by [`ContentResolver`]:
//! `initialize`, `load_catalog`, and `set_path_redirect`. [`CatalogMerger`]
//! drives them after promotion: it loads the promoted catalog (additive
//! merge: newer entries for the same address override older ones, per the
//! resolver's contract) and installs a one-time path-redirection rule so
//! locally-promoted bundles are preferred over their original remote
//! locations.
//!
//! The returned [`CatalogHandle`] must be kept alive for the remainder of
//! the run; dropping it unloads the merged content.
//!
//! [`LocalResolver`] is a reference implementation over a JSON address map,
//! backing the CLI and tests.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::package::BUNDLE_DIR;

/// Rewrites a resolver lookup location; `None` leaves the lookup untouched.
pub type PathRedirect = Box<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

/// Opaque token keeping one merged catalog loaded.
///
/// Dropping the handle releases the merged address space.
#[derive(Debug)]
pub struct CatalogHandle {
    /// Identifier assigned by the resolver
    pub id: u64,
}

/// The three operations the engine needs from the host's content-resolution
/// layer.
pub trait ContentResolver: Send + Sync {
    /// Initialize with whatever catalog ships in the base install.
    ///
    /// Failure here is fatal to the program: content cannot be loaded at all.
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send;

    /// Parse and register a catalog file, merging its address space with the
    /// active catalog. Newer entries for the same address win.
    fn load_catalog(&self, path: &Path) -> impl Future<Output = Result<CatalogHandle>> + Send;

    /// Install the path-redirection rule consulted on every load.
    fn set_path_redirect(&self, redirect: PathRedirect);
}

/// Loads the promoted catalog into the resolver and installs the local-first
/// redirect.
pub struct CatalogMerger;

impl CatalogMerger {
    /// Merge `catalog_path` and redirect remote-looking lookups into
    /// `local_root/bundles/` when the file exists there.
    ///
    /// Returns the handle that must outlive all subsequent content loads.
    pub async fn merge<R: ContentResolver>(
        resolver: &R,
        catalog_path: &Path,
        local_root: &Path,
    ) -> Result<CatalogHandle> {
        let handle = resolver
            .load_catalog(catalog_path)
            .await
            .with_context(|| format!("Failed to load catalog: {}", catalog_path.display()))?;

        let bundle_dir = local_root.join(BUNDLE_DIR);
        resolver.set_path_redirect(Box::new(move |original| {
            redirect_to_local(&bundle_dir, original)
        }));

        info!(catalog = %catalog_path.display(), "catalog merged, local redirect installed");
        Ok(handle)
    }
}

/// The redirect rule: remote-looking locations whose file name exists under
/// the local bundle directory resolve locally; everything else falls through
/// to the original resolution.
fn redirect_to_local(bundle_dir: &Path, original: &str) -> Option<PathBuf> {
    if !(original.starts_with("http://") || original.starts_with("https://")) {
        return None;
    }
    let file_name = original.rsplit('/').next()?;
    let local = bundle_dir.join(file_name);
    if local.is_file() {
        debug!(original = %original, local = %local.display(), "redirecting to local bundle");
        Some(local)
    } else {
        None
    }
}

/// JSON catalog format consumed by [`LocalResolver`]: address → location.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    addresses: HashMap<String, String>,
}

#[derive(Default)]
struct LocalResolverState {
    addresses: HashMap<String, String>,
    redirect: Option<PathRedirect>,
    next_handle: u64,
    initialized: bool,
}

/// Reference [`ContentResolver`] over a JSON address map.
///
/// Lookups apply the installed redirect to the registered location before
/// returning it, mirroring how a real resolution layer consults the rule at
/// load time.
#[derive(Default)]
pub struct LocalResolver {
    state: Arc<Mutex<LocalResolverState>>,
    base_catalog: Option<PathBuf>,
}

impl LocalResolver {
    /// Resolver with no base catalog (fresh install).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that loads `base_catalog` during `initialize`.
    pub fn with_base_catalog(base_catalog: PathBuf) -> Self {
        Self { state: Arc::default(), base_catalog: Some(base_catalog) }
    }

    /// Resolve an address to its (possibly redirected) location.
    pub fn resolve(&self, address: &str) -> Option<PathBuf> {
        let state = self.state.lock().expect("resolver state poisoned");
        let location = state.addresses.get(address)?;
        if let Some(redirect) = &state.redirect
            && let Some(local) = redirect(location)
        {
            return Some(local);
        }
        Some(PathBuf::from(location))
    }

    /// Number of merged addresses currently registered.
    pub fn address_count(&self) -> usize {
        self.state.lock().expect("resolver state poisoned").addresses.len()
    }

    fn merge_file(&self, path: &Path) -> Result<u64> {
        let catalog: CatalogFile = crate::utils::read_json_file(path)?;
        let mut state = self.state.lock().expect("resolver state poisoned");
        // Additive merge: newer entries override.
        state.addresses.extend(catalog.addresses);
        state.next_handle += 1;
        Ok(state.next_handle)
    }
}

impl ContentResolver for LocalResolver {
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            if let Some(base) = &self.base_catalog {
                self.merge_file(base)
                    .with_context(|| format!("Failed to load base catalog: {}", base.display()))?;
            }
            self.state.lock().expect("resolver state poisoned").initialized = true;
            Ok(())
        }
    }

    fn load_catalog(&self, path: &Path) -> impl Future<Output = Result<CatalogHandle>> + Send {
        let path = path.to_path_buf();
        async move {
            let id = self.merge_file(&path)?;
            Ok(CatalogHandle { id })
        }
    }

    fn set_path_redirect(&self, redirect: PathRedirect) {
        self.state.lock().expect("resolver state poisoned").redirect = Some(redirect);
    }
}
