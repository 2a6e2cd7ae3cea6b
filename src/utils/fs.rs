//! Filesystem operations with contextual error messages.
//!
//! Everything that touches the package directories goes through this module so
//! that failure messages carry the offending path and promotion-critical
//! operations (atomic writes, merge-moves) behave the same on every platform.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Creates a directory and all parent directories if they don't exist.
///
/// Returns an error if the path exists but is not a directory.
///
/// # Examples
///
/// ```rust
/// use hotpatch_cli::utils::fs::ensure_dir;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// ensure_dir(Path::new("local/bundles"))?;
/// # Ok(())
/// # }
/// ```
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Creates the parent directory of `path` if needed.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Safely writes bytes to a file using atomic operations.
///
/// Writes to a temporary sibling first, syncs, then renames over the target.
/// Readers never observe a half-written file. Used for every descriptor and
/// state file this crate persists (`version_state.json`, snapshots, the
/// version store).
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    ensure_parent_dir(path)?;

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Reads a text file with path context on failure.
pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Writes a text file atomically.
pub fn write_text_file(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Reads and parses a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_json_file<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = read_text_file(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON from file: {}", path.display()))
}

/// Writes data as JSON to a file atomically.
///
/// # Arguments
/// * `path` - The path to write to
/// * `data` - The data to serialize
/// * `pretty` - Whether to use pretty formatting
pub fn write_json_file<T>(path: &Path, data: &T, pretty: bool) -> Result<()>
where
    T: serde::Serialize,
{
    let json = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };

    write_text_file(path, &json).with_context(|| format!("Failed to write JSON file: {}", path.display()))
}

/// Reads and parses a TOML file.
pub fn read_toml_file<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = read_text_file(path)?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Normalizes a path for storage in descriptors and hash input.
///
/// Always uses forward slashes so digests and serialized state are identical
/// across platforms.
pub fn normalize_path_for_storage(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursively moves the contents of `src` into `dst`, overwriting
/// same-named files, then removes the emptied `src`.
///
/// This is the promotion primitive: staged files become the active files in
/// one pass. Directories are merged; a plain `fs::rename` is attempted per
/// file first and falls back to copy-then-delete for cross-device moves.
///
/// # Errors
/// Fails on the first file that cannot be moved. Callers must treat a
/// partially-moved tree as a detectable incomplete promotion (the source
/// directory is still present).
pub fn move_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            move_dir_contents(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if fs::rename(&src_path, &dst_path).is_err() {
                // Cross-device fallback
                fs::copy(&src_path, &dst_path).with_context(|| {
                    format!(
                        "Failed to move {} to {}",
                        src_path.display(),
                        dst_path.display()
                    )
                })?;
                fs::remove_file(&src_path).with_context(|| {
                    format!("Failed to remove moved file: {}", src_path.display())
                })?;
            }
        }
        // Symlinks and special files are not part of a package layout; skip.
    }

    fs::remove_dir(src).with_context(|| format!("Failed to remove emptied directory: {}", src.display()))?;
    Ok(())
}
