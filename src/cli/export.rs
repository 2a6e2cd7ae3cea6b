//! The `export` command: authored content declaration → exported manifest.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::manifest::ManifestExporter;

/// Export the authored content declaration (`content.toml`) to the
/// packaging-time manifest (`manifest_export.json`).
///
/// The export is deterministic: re-exporting unchanged content produces an
/// identical manifest, so it can be diffed across builds.
#[derive(Args)]
pub struct ExportCommand {
    /// Authored content declaration
    #[arg(long, default_value = "content.toml")]
    content: PathBuf,

    /// Directory to write `manifest_export.json` into
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

impl ExportCommand {
    pub async fn execute(self) -> Result<()> {
        let export = ManifestExporter::export_to_dir(&self.content, &self.out)?;

        let kinds: std::collections::BTreeSet<&str> =
            export.by_kind.keys().map(String::as_str).collect();
        println!(
            "Exported {} entries ({} kinds, {} labels) to {}",
            export.entries.len(),
            kinds.len(),
            export.by_label.len(),
            self.out.join(crate::manifest::ExportedManifest::FILE_NAME).display()
        );
        Ok(())
    }
}
