//! Hotpatch - incremental content update engine
//!
//! A client-side delta update system for bundled content: at build time it
//! exports a packaging manifest and organizes raw build output into
//! versioned, hash-addressed packages; at run time it detects version and
//! content changes against a published remote root, downloads only the
//! changed bundles, and promotes them atomically into the local content set.
//!
//! # Architecture Overview
//!
//! The engine is split into a build pipeline and a runtime pipeline that
//! meet at the published package layout:
//!
//! ```text
//! build:   content.toml ──export──▶ manifest_export.json
//!          raw build dir ──pack──▶ pkg_<version>/{bundles/, catalog.json,
//!                                                  version_state.json}
//!                                   manifest.json (pointer, written last)
//!
//! runtime: manifest.json ─▶ version_state.json ─▶ changed bundles
//!              ─▶ staging/ ─▶ promote ─▶ local/ ─▶ catalog merge
//! ```
//!
//! Three rules hold the whole thing together:
//!
//! - **Hashes decide everything.** A package's identity is the rollup digest
//!   of its contents; equal digests mean nothing to download, and every
//!   downloaded bundle is re-verified against its descriptor digest before
//!   promotion.
//! - **Descriptors are written last.** A package directory (or staging
//!   directory) without its `version_state.json` is by definition
//!   incomplete and is never consumed.
//! - **Updates are best-effort.** Any fetch or verification failure before
//!   promotion collapses into "run on installed content"; the local root is
//!   only ever mutated by the promotion step, after the whole batch
//!   verified.
//!
//! # Core Modules
//!
//! ## Build pipeline
//! - [`manifest`] - authored content declaration, exported manifest, and the
//!   published pointer record
//! - [`package`] - package layout, version descriptor, and the build
//!   organizer
//! - [`snapshot`] - per-release asset snapshots, diffing, and delete-list
//!   derivation
//! - [`version`] - version numbers and the persistent build counter
//!
//! ## Runtime pipeline
//! - [`update`] - the orchestrator driving one update flow per program start
//! - [`download`] - the fetcher seam and its HTTP implementation
//! - [`staging`] - staged-to-local promotion and the major-version wipe
//! - [`catalog`] - catalog merging and the content-resolution seam
//!
//! ## Supporting modules
//! - [`cli`] - command-line interface (`export`, `pack`, `update`, `status`)
//! - [`config`] - `hotpatch.toml` parsing and validation
//! - [`core`] - error types and user-facing error contexts
//! - [`hash`] - content digests in `sha256:<hex>` notation
//! - [`utils`] - filesystem helpers and progress reporting

// Build pipeline
pub mod manifest;
pub mod package;
pub mod snapshot;
pub mod version;

// Runtime pipeline
pub mod catalog;
pub mod download;
pub mod staging;
pub mod update;

// Supporting modules
pub mod cli;
pub mod config;
pub mod core;
pub mod hash;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
