//! Runtime update flow against scripted remote packages.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use hotpatch_cli::catalog::LocalResolver;
use hotpatch_cli::package::{BUNDLE_DIR, VERSION_STATE_FILE};
use hotpatch_cli::test_utils::{MemoryFetcher, RemotePackageBuilder};
use hotpatch_cli::update::{UpdateConfig, UpdateOrchestrator, UpdateOutcome};
use hotpatch_cli::version::VersionNumber;

use super::common::REMOTE_ROOT;

fn orchestrator(
    temp: &TempDir,
    fetcher: MemoryFetcher,
) -> UpdateOrchestrator<MemoryFetcher, LocalResolver> {
    let config = UpdateConfig {
        remote_root: REMOTE_ROOT.to_string(),
        local_root: temp.path().join("local"),
        staging_root: temp.path().join("staging"),
        concurrency: 2,
    };
    UpdateOrchestrator::new(config, fetcher, LocalResolver::new())
}

fn local_bundle(temp: &TempDir, name: &str) -> std::path::PathBuf {
    temp.path().join("local").join(BUNDLE_DIR).join(name)
}

async fn install(temp: &TempDir, builder: RemotePackageBuilder) {
    let fetcher = MemoryFetcher::new();
    builder.publish(&fetcher);
    let orch = orchestrator(temp, fetcher);
    match orch.run().await.unwrap() {
        UpdateOutcome::Updated(_) => {}
        other => panic!("install did not apply: {other:?}"),
    }
}

#[tokio::test]
async fn test_fresh_install_then_patch_update() {
    let temp = TempDir::new().unwrap();

    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"content A".to_vec()),
    )
    .await;
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"content A");

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.1", VersionNumber::new(1, 0, 1))
        .bundle("core_assets_all.bundle", b"content B".to_vec())
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    let outcome = orch.run().await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Updated(VersionNumber::new(1, 0, 1)));
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"content B");
    assert!(orch.has_merged_catalog());
    // Staging fully consumed by promotion
    assert!(!temp.path().join("staging").exists());
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let temp = TempDir::new().unwrap();
    let package = || {
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"content A".to_vec())
    };

    install(&temp, package()).await;

    let fetcher = MemoryFetcher::new();
    package().publish(&fetcher);
    let orch = orchestrator(&temp, fetcher);

    assert_eq!(orch.run().await.unwrap(), UpdateOutcome::UpToDate);
    // Hash equality short-circuits before any bundle or catalog transfer.
    assert_eq!(orch.fetcher().byte_fetch_count(), 0);
}

#[tokio::test]
async fn test_failed_bundle_leaves_local_untouched() {
    let temp = TempDir::new().unwrap();
    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"content A".to_vec()),
    )
    .await;

    let descriptor = temp.path().join("local").join(VERSION_STATE_FILE);
    let before = fs::read(&descriptor).unwrap();

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.1", VersionNumber::new(1, 0, 1))
        .bundle("core_assets_all.bundle", b"content B".to_vec())
        .bundle("world_assets_all.bundle", b"world".to_vec())
        .publish(&fetcher);
    fetcher.fail(
        format!("{REMOTE_ROOT}/pkg_1.0.1/{BUNDLE_DIR}/world_assets_all.bundle"),
        "connection reset",
    );

    let orch = orchestrator(&temp, fetcher);
    let mut ready = orch.subscribe();
    let outcome = orch.run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::RunLocal(_)));
    // Local root byte-identical to before the attempt
    assert_eq!(fs::read(&descriptor).unwrap(), before);
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"content A");
    // Nothing partial survives
    assert!(!temp.path().join("staging").exists());
    // Readiness fired despite the failure
    assert!(ready.has_changed().unwrap());
    assert!(*ready.borrow_and_update());
}

#[tokio::test]
async fn test_corrupted_bundle_is_rejected() {
    let temp = TempDir::new().unwrap();
    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"content A".to_vec()),
    )
    .await;

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.1", VersionNumber::new(1, 0, 1))
        .bundle("core_assets_all.bundle", b"content B".to_vec())
        .publish(&fetcher);
    // Serve bytes that disagree with the descriptor digest.
    fetcher.stub(
        format!("{REMOTE_ROOT}/pkg_1.0.1/{BUNDLE_DIR}/core_assets_all.bundle"),
        b"tampered".to_vec(),
    );

    let orch = orchestrator(&temp, fetcher);
    let outcome = orch.run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::RunLocal(_)));
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"content A");
}

#[tokio::test]
async fn test_delete_list_prunes_superseded_bundles() {
    let temp = TempDir::new().unwrap();
    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"core v1".to_vec())
            .bundle("legacy_assets_all.bundle", b"legacy".to_vec()),
    )
    .await;
    assert!(local_bundle(&temp, "legacy_assets_all.bundle").exists());

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.1", VersionNumber::new(1, 0, 1))
        .bundle("core_assets_all.bundle", b"core v2".to_vec())
        .delete_prefix("legacy_assets_")
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    assert!(matches!(orch.run().await.unwrap(), UpdateOutcome::Updated(_)));

    assert!(!local_bundle(&temp, "legacy_assets_all.bundle").exists());
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"core v2");
}

#[tokio::test]
async fn test_major_version_change_wipes_local_root() {
    let temp = TempDir::new().unwrap();
    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.4.2", VersionNumber::new(1, 4, 2))
            .bundle("core_assets_all.bundle", b"gen one core".to_vec())
            .bundle("extra_assets_all.bundle", b"gen one extra".to_vec()),
    )
    .await;

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_2.0.0", VersionNumber::new(2, 0, 0))
        .bundle("core_assets_all.bundle", b"gen two core".to_vec())
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    assert_eq!(orch.run().await.unwrap(), UpdateOutcome::Updated(VersionNumber::new(2, 0, 0)));

    // Nothing from the previous generation survives, not even bundles the
    // new version never mentioned.
    assert!(!local_bundle(&temp, "extra_assets_all.bundle").exists());
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"gen two core");
}

#[tokio::test]
async fn test_unreachable_remote_runs_local_and_signals_ready() {
    let temp = TempDir::new().unwrap();

    // Nothing scripted at all: every fetch fails.
    let orch = orchestrator(&temp, MemoryFetcher::new());
    let mut ready = orch.subscribe();
    let outcome = orch.run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::RunLocal(_)));
    assert!(*ready.borrow_and_update());
    assert!(!orch.has_merged_catalog());
}

#[tokio::test]
async fn test_cancellation_before_start() {
    let temp = TempDir::new().unwrap();
    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
        .bundle("core_assets_all.bundle", b"content A".to_vec())
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    orch.cancellation_token().cancel();

    let outcome = orch.run().await.unwrap();
    assert_eq!(outcome, UpdateOutcome::RunLocal("update cancelled".to_string()));
    assert!(!Path::new(&temp.path().join("local").join(VERSION_STATE_FILE)).exists());
}

#[tokio::test]
async fn test_cancellation_mid_download_leaves_local_untouched() {
    let temp = TempDir::new().unwrap();
    install(
        &temp,
        RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
            .bundle("core_assets_all.bundle", b"content A".to_vec()),
    )
    .await;

    let descriptor = temp.path().join("local").join(VERSION_STATE_FILE);
    let before = fs::read(&descriptor).unwrap();

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.1", VersionNumber::new(1, 0, 1))
        .bundle("core_assets_all.bundle", b"content B".to_vec())
        .publish(&fetcher);
    // Keep the bundle transfer in flight long enough to cancel under it.
    fetcher.delay_bytes(Duration::from_secs(60));

    let orch = orchestrator(&temp, fetcher);
    let token = orch.cancellation_token();
    let (outcome, ()) = tokio::join!(orch.run(), async {
        while orch.fetcher().byte_fetch_count() == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel();
    });

    assert_eq!(outcome.unwrap(), UpdateOutcome::RunLocal("update cancelled".to_string()));
    // The in-flight bundle was abandoned; the catalog fetch never started.
    assert_eq!(orch.fetcher().byte_fetch_count(), 1);
    // Local root byte-identical to before the attempt, nothing partial left.
    assert_eq!(fs::read(&descriptor).unwrap(), before);
    assert_eq!(fs::read(local_bundle(&temp, "core_assets_all.bundle")).unwrap(), b"content A");
    assert!(!temp.path().join("staging").exists());
}

#[tokio::test]
async fn test_undiscardable_stale_staging_skips_update_but_signals_ready() {
    let temp = TempDir::new().unwrap();
    // A regular file where the staging directory is expected makes the
    // discard fail without any permission games.
    fs::write(temp.path().join("staging"), b"not a directory").unwrap();

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
        .bundle("core_assets_all.bundle", b"content A".to_vec())
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    let mut ready = orch.subscribe();
    let outcome = orch.run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::RunLocal(_)));
    // Startup proceeds: readiness fired even though the discard failed.
    assert!(*ready.borrow_and_update());
    // The update itself never started.
    assert_eq!(orch.fetcher().text_fetch_count(), 0);
    assert!(!temp.path().join("local").join(VERSION_STATE_FILE).exists());
}

#[tokio::test]
async fn test_stale_staging_is_discarded_on_next_run() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    fs::create_dir_all(staging.join(BUNDLE_DIR)).unwrap();
    fs::write(staging.join(BUNDLE_DIR).join("half.bundle"), b"partial").unwrap();

    let fetcher = MemoryFetcher::new();
    RemotePackageBuilder::new(REMOTE_ROOT, "pkg_1.0.0", VersionNumber::new(1, 0, 0))
        .bundle("core_assets_all.bundle", b"content A".to_vec())
        .publish(&fetcher);

    let orch = orchestrator(&temp, fetcher);
    assert!(matches!(orch.run().await.unwrap(), UpdateOutcome::Updated(_)));

    // The half-downloaded leftover never reached the local root.
    assert!(!local_bundle(&temp, "half.bundle").exists());
}
