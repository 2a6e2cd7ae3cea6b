//! Build pipeline end-to-end: export, organize, publish, then consume the
//! published directory through the update flow.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use hotpatch_cli::catalog::LocalResolver;
use hotpatch_cli::manifest::{ExportedManifest, ManifestExporter, ManifestPointer};
use hotpatch_cli::package::{
    BUNDLE_DIR, BuildOrganizer, CATALOG_FILE, OrganizeRequest, UNKNOWN_IDENTITY,
    VERSION_STATE_FILE, VersionState,
};
use hotpatch_cli::test_utils::MemoryFetcher;
use hotpatch_cli::update::{UpdateConfig, UpdateOrchestrator, UpdateOutcome};
use hotpatch_cli::utils::write_json_file;
use hotpatch_cli::version::{VersionNumber, VersionStore};

use super::common::{REMOTE_ROOT, serve_dir, write_authored_content};

/// Produce a raw build directory the way an asset build would: one catalog,
/// one checksum sibling, and the bundles named by the export.
fn write_raw_build(raw_dir: &Path, export: &ExportedManifest, bodies: &[(&str, &[u8])]) {
    fs::create_dir_all(raw_dir).unwrap();
    let catalog = serde_json::json!({
        "addresses": {
            "ui/title": format!("{REMOTE_ROOT}/pkg_1.0.1/{BUNDLE_DIR}/core_assets_ui.bundle"),
            "world/map": format!("{REMOTE_ROOT}/pkg_1.0.1/{BUNDLE_DIR}/world_assets_all.bundle"),
        }
    });
    fs::write(raw_dir.join("catalog.json"), serde_json::to_vec_pretty(&catalog).unwrap()).unwrap();
    fs::write(raw_dir.join("catalog.hash"), b"build-tool checksum, discarded").unwrap();

    for (name, body) in bodies {
        assert!(
            export.identity_of(name).is_some(),
            "fixture bundle '{name}' must be attributable"
        );
        fs::write(raw_dir.join(name), body).unwrap();
    }
}

#[tokio::test]
async fn test_export_pack_publish_update() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();

    // Author two groups, one labeled and one not.
    let content = write_authored_content(
        &workspace,
        &[
            ("ui/title", "Assets/UI/Title.prefab", "core", &["ui"], b"title screen v1"),
            ("world/map", "Assets/World/Map.asset", "world", &[], b"overworld map v1"),
        ],
    );

    let build_dir = workspace.join("build");
    let export = ManifestExporter::export_to_dir(&content, &build_dir).unwrap();
    assert!(build_dir.join(ExportedManifest::FILE_NAME).exists());
    assert_eq!(export.entries.len(), 2);

    // Version counter: fresh store starts at 1.0.0, first release is 1.0.1.
    let state_dir = workspace.join(".hotpatch");
    let mut store = VersionStore::load(&state_dir).unwrap();
    let version = store.increment_patch().unwrap();
    assert_eq!(version, VersionNumber::new(1, 0, 1));

    let raw_dir = workspace.join("raw");
    write_raw_build(
        &raw_dir,
        &export,
        &[
            ("core_assets_ui.bundle", b"core bundle bytes"),
            ("world_assets_all.bundle", b"world bundle bytes"),
        ],
    );

    let publish = workspace.join("publish");
    let package_dir = publish.join("pkg_1.0.1");
    let state = BuildOrganizer::organize(&OrganizeRequest {
        raw_dir: &raw_dir,
        package_dir: &package_dir,
        export: &export,
        version,
        delete_list: Vec::new(),
        size_limit: 0,
    })
    .unwrap();

    // Canonical package layout, with the checksum sibling discarded and
    // every bundle attributed to a logical identity.
    assert!(package_dir.join(CATALOG_FILE).exists());
    assert!(package_dir.join(VERSION_STATE_FILE).exists());
    assert!(!package_dir.join("catalog.hash").exists());
    assert_eq!(state.bundles.len(), 2);
    assert!(state.bundles.iter().all(|b| b.logical_key != UNKNOWN_IDENTITY));

    let pointer = ManifestPointer { latest_package: "pkg_1.0.1".to_string(), latest_version: version };
    write_json_file(&publish.join(ManifestPointer::FILE_NAME), &pointer, true).unwrap();

    // Serve the published tree and run a client update against it.
    let fetcher = MemoryFetcher::new();
    serve_dir(&fetcher, &publish);

    let local_root = temp.path().join("client/local");
    let orch = UpdateOrchestrator::new(
        UpdateConfig {
            remote_root: REMOTE_ROOT.to_string(),
            local_root: local_root.clone(),
            staging_root: temp.path().join("client/staging"),
            concurrency: 2,
        },
        fetcher,
        LocalResolver::new(),
    );

    assert_eq!(orch.run().await.unwrap(), UpdateOutcome::Updated(version));

    // The client's descriptor matches what the build published.
    let installed = VersionState::load(&local_root).unwrap();
    assert_eq!(installed.hash, state.hash);
    assert_eq!(installed.bundles, state.bundles);

    // The merged catalog redirects remote addresses to promoted bundles.
    assert_eq!(
        orch.resolver().resolve("ui/title"),
        Some(local_root.join(BUNDLE_DIR).join("core_assets_ui.bundle"))
    );
}

#[tokio::test]
async fn test_unchanged_content_republish_is_up_to_date() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();

    let content = write_authored_content(
        &workspace,
        &[("ui/title", "Assets/UI/Title.prefab", "core", &["ui"], b"title screen v1")],
    );
    let export = ManifestExporter::export_file(&content).unwrap();

    let raw_dir = workspace.join("raw");
    fs::create_dir_all(&raw_dir).unwrap();
    let catalog = serde_json::json!({ "addresses": {} });
    fs::write(raw_dir.join("catalog.json"), serde_json::to_vec_pretty(&catalog).unwrap()).unwrap();
    fs::write(raw_dir.join("core_assets_ui.bundle"), b"core bundle bytes").unwrap();

    let organize = |package_dir: &Path, version| {
        BuildOrganizer::organize(&OrganizeRequest {
            raw_dir: &raw_dir,
            package_dir,
            export: &export,
            version,
            delete_list: Vec::new(),
            size_limit: 0,
        })
        .unwrap()
    };

    // Two releases of byte-identical content carry the same rollup hash, so
    // clients on the first release skip the second entirely.
    let first = organize(&workspace.join("publish/pkg_1.0.1"), VersionNumber::new(1, 0, 1));
    let second = organize(&workspace.join("publish/pkg_1.0.2"), VersionNumber::new(1, 0, 2));
    assert_eq!(first.hash, second.hash);
}
