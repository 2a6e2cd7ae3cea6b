//! Shared fixtures for the integration suite.

use std::fs;
use std::path::Path;

use hotpatch_cli::test_utils::MemoryFetcher;
use walkdir::WalkDir;

/// Remote root used by every scripted fetcher in this suite.
pub const REMOTE_ROOT: &str = "https://cdn.test/content";

/// Script every file under `publish_dir` into `fetcher`, mapping relative
/// paths onto URLs beneath [`REMOTE_ROOT`]. This turns a directory produced
/// by the build pipeline into a servable remote.
pub fn serve_dir(fetcher: &MemoryFetcher, publish_dir: &Path) {
    for entry in WalkDir::new(publish_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(publish_dir)
            .expect("walked path outside publish dir")
            .to_string_lossy()
            .replace('\\', "/");
        let body = fs::read(entry.path()).expect("readable published file");
        fetcher.stub(format!("{REMOTE_ROOT}/{relative}"), body);
    }
}

/// Write an authored content declaration plus its source asset files.
///
/// Each entry is (address, relative path, group, labels, file body); the
/// declaration lands at `<dir>/content.toml`.
pub fn write_authored_content(
    dir: &Path,
    entries: &[(&str, &str, &str, &[&str], &[u8])],
) -> std::path::PathBuf {
    use std::collections::BTreeMap;

    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (address, path, group, labels, body) in entries {
        let source = dir.join(path);
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, body).unwrap();

        let labels_toml = labels
            .iter()
            .map(|l| format!("\"{l}\""))
            .collect::<Vec<_>>()
            .join(", ");
        groups.entry(*group).or_default().push(format!(
            "{{ address = \"{address}\", path = \"{path}\", guid = \"guid-{address}\", labels = [{labels_toml}] }}"
        ));
    }

    let mut toml = String::new();
    for (group, entries) in groups {
        toml.push_str(&format!("[[groups]]\nname = \"{group}\"\nentries = [\n"));
        for entry in entries {
            toml.push_str("    ");
            toml.push_str(&entry);
            toml.push_str(",\n");
        }
        toml.push_str("]\n\n");
    }

    let path = dir.join("content.toml");
    fs::write(&path, toml).unwrap();
    path
}
