//! CLI smoke tests through the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use super::common::write_authored_content;

fn hotpatch() -> Command {
    let mut cmd = Command::cargo_bin("hotpatch").unwrap();
    cmd.env("HOTPATCH_NO_PROGRESS", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    hotpatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("pack"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_export_writes_manifest() {
    let temp = TempDir::new().unwrap();
    let content = write_authored_content(
        temp.path(),
        &[("ui/title", "Assets/UI/Title.prefab", "core", &["ui"], b"title")],
    );

    hotpatch()
        .arg("export")
        .arg("--content")
        .arg(&content)
        .arg("--out")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 entries"));

    assert!(temp.path().join("manifest_export.json").exists());
}

#[test]
fn test_export_rejects_duplicate_addresses() {
    let temp = TempDir::new().unwrap();
    let content = write_authored_content(
        temp.path(),
        &[
            ("ui/title", "Assets/UI/Title.prefab", "core", &["ui"], b"title"),
            ("ui/title", "Assets/UI/Other.prefab", "core", &[], b"other"),
        ],
    );

    hotpatch()
        .arg("export")
        .arg("--content")
        .arg(&content)
        .arg("--out")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate content key"));
}

#[test]
fn test_failed_pack_does_not_consume_a_version() {
    let temp = TempDir::new().unwrap();
    let content = write_authored_content(
        temp.path(),
        &[("ui/title", "Assets/UI/Title.prefab", "core", &["ui"], b"title")],
    );
    let raw = temp.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("catalog.json"), b"{\"addresses\":{}}").unwrap();
    fs::write(raw.join("core_assets_ui.bundle"), b"bundle bytes").unwrap();

    // Build exceeds the size limit: no package is published and the version
    // counter stays where it was.
    hotpatch()
        .current_dir(temp.path())
        .arg("pack")
        .arg("--content")
        .arg(&content)
        .arg("--raw-dir")
        .arg(&raw)
        .arg("--out")
        .arg(temp.path().join("publish"))
        .args(["--size-limit", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds limit"));

    // The retry gets the number the failed build would otherwise have taken.
    hotpatch()
        .current_dir(temp.path())
        .arg("pack")
        .arg("--content")
        .arg(&content)
        .arg("--raw-dir")
        .arg(&raw)
        .arg("--out")
        .arg(temp.path().join("publish"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Packed 1.0.1"));
}

#[test]
fn test_status_with_nothing_installed() {
    let temp = TempDir::new().unwrap();
    hotpatch()
        .current_dir(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No content installed"));
}

#[test]
fn test_update_requires_remote_url() {
    let temp = TempDir::new().unwrap();
    hotpatch()
        .current_dir(temp.path())
        .arg("update")
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote.url"));
}

#[test]
fn test_config_validation_rejects_shared_roots() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("hotpatch.toml"),
        r#"
[local]
root = "content"
staging = "content"
"#,
    )
    .unwrap();

    hotpatch()
        .current_dir(temp.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be different"));
}
