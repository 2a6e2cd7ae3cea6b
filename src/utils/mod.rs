//! Cross-platform utilities shared by the build-time and runtime pipelines.
//!
//! - [`fs`] - filesystem helpers: atomic writes, JSON/TOML persistence,
//!   recursive merge-moves used by promotion
//! - [`progress`] - thin wrappers over `indicatif` for download and
//!   packaging progress reporting

pub mod fs;
pub mod progress;

pub use fs::{
    atomic_write, ensure_dir, ensure_parent_dir, move_dir_contents, normalize_path_for_storage,
    read_json_file, read_text_file, read_toml_file, write_json_file, write_text_file,
};
pub use progress::{MultiProgress, ProgressBar};
