//! Core types and error handling for the update engine.
//!
//! The error system follows a two-layer design:
//! - [`HotpatchError`] - strongly-typed failure classes the orchestrator
//!   branches on (recoverable network failures vs. build-time hard stops)
//! - [`ErrorContext`] - user-facing wrapper adding suggestions and details
//!   for CLI display

pub mod error;

pub use error::{ErrorContext, HotpatchError, user_friendly_error};
