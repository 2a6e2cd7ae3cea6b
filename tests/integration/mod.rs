//! Integration test suite for the hotpatch engine.
//!
//! End-to-end tests covering the build pipeline (export, organize, publish)
//! and the runtime update flow (detection, download, promotion, catalog
//! merge), plus CLI smoke tests through the installed binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **build_pipeline**: export and pack producing a publishable package
//! - **update_flow**: the orchestrator against scripted remote packages
//! - **cli_smoke**: argument parsing and command wiring via the binary

mod common;

mod build_pipeline;
mod cli_smoke;
mod update_flow;
