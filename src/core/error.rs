//! Error handling for the hotpatch update engine.
//!
//! Two types cooperate here:
//! - [`HotpatchError`] - enumerated failure classes for every operation in
//!   the build and update pipelines
//! - [`ErrorContext`] - wrapper that adds user-friendly messages and
//!   suggestions for CLI display
//!
//! The update flow is best-effort by design: the orchestrator catches
//! [`HotpatchError::NetworkUnavailable`], [`HotpatchError::HashMismatch`],
//! and [`HotpatchError::MalformedDescriptor`] and collapses them into
//! "continue with current local content". Build-time
//! errors ([`HotpatchError::SizeLimitExceeded`], export validation) are hard
//! stops. Use [`user_friendly_error`] at the CLI boundary to convert any
//! `anyhow::Error` into a displayable context.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotpatch_cli::core::{HotpatchError, user_friendly_error};
//!
//! fn fetch_manifest() -> Result<(), HotpatchError> {
//!     Err(HotpatchError::NetworkUnavailable {
//!         url: "https://cdn.example.com/manifest.json".to_string(),
//!         reason: "connection refused".to_string(),
//!     })
//! }
//!
//! if let Err(e) = fetch_manifest() {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for hotpatch operations.
///
/// Recoverable classes (`NetworkUnavailable`, `HashMismatch`,
/// `MalformedDescriptor`) never block program startup; the orchestrator
/// degrades to running on installed content. Everything else propagates.
#[derive(Error, Debug, Clone)]
pub enum HotpatchError {
    /// A remote fetch failed (manifest pointer, version descriptor, bundle,
    /// or catalog). Recoverable: the update is skipped for this run.
    #[error("Network unavailable fetching {url}: {reason}")]
    NetworkUnavailable {
        /// The URL that could not be fetched
        url: String,
        /// Transport or HTTP status detail
        reason: String,
    },

    /// A downloaded bundle's digest disagrees with its descriptor entry.
    ///
    /// Treated exactly like [`NetworkUnavailable`](Self::NetworkUnavailable):
    /// the whole update is aborted before promotion, nothing is applied.
    #[error("Hash mismatch for bundle '{bundle}': expected {expected}, got {actual}")]
    HashMismatch {
        /// Bundle file name that failed verification
        bundle: String,
        /// Digest recorded in the version descriptor
        expected: String,
        /// Digest computed from the downloaded bytes
        actual: String,
    },

    /// The organized package exceeds the configured size threshold.
    ///
    /// Build-time hard stop: raised before the descriptor is written, so the
    /// oversized package is never marked complete.
    #[error("Package size {actual} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Total size of all bundles in the organized package
        actual: u64,
        /// Configured maximum
        limit: u64,
    },

    /// Filesystem operation failed during promotion or packaging.
    #[error("I/O failure during {operation}: {path}")]
    IoFailure {
        /// Operation being performed ("promote", "wipe", "organize", ...)
        operation: String,
        /// Path involved
        path: String,
    },

    /// The manifest pointer or a descriptor could not be parsed.
    #[error("Malformed {what}: {reason}")]
    MalformedDescriptor {
        /// Which record failed to parse ("manifest pointer", "version state")
        what: String,
        /// Parse failure detail
        reason: String,
    },

    /// Authoring input declared the same content key twice.
    #[error("Duplicate content key '{key}' in group '{group}'")]
    DuplicateKey {
        /// The repeated address/key
        key: String,
        /// Group declaring the duplicate
        group: String,
    },

    /// Two logical identities generate the same bundle file name. Names are
    /// lowercased, so groups or labels differing only by case collide.
    #[error("Bundle name collision: '{file}' is produced by both '{first}' and '{second}'")]
    BundleNameCollision {
        /// The colliding bundle file name
        file: String,
        /// Identity that claimed the name first
        first: String,
        /// Identity that collided with it
        second: String,
    },

    /// A second staged snapshot was submitted before the first was released.
    #[error("A staged snapshot already exists (version {version})")]
    SnapshotAlreadyStaged {
        /// Version of the snapshot currently staged
        version: String,
    },

    /// Another update run holds the lock for this local root.
    #[error("Update already in progress for local root: {path}")]
    UpdateInProgress {
        /// The locked local content root
        path: String,
    },

    /// Configuration file problem.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl HotpatchError {
    /// Whether the orchestrator may swallow this failure and continue with
    /// the installed content.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable { .. }
                | Self::HashMismatch { .. }
                | Self::MalformedDescriptor { .. }
        )
    }
}

/// User-friendly error wrapper with optional suggestion and details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying hotpatch error
    pub error: HotpatchError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`HotpatchError`].
    #[must_use]
    pub const fn new(error: HotpatchError) -> Self {
        Self { error, suggestion: None, details: None }
    }

    /// Add an actionable suggestion, displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining why the error occurred, displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`] with contextual
/// suggestions. Used at the CLI boundary.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(hp_error) = error.downcast_ref::<HotpatchError>() {
        return create_error_context(hp_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(HotpatchError::IoFailure {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check file ownership or run with elevated permissions")
                .with_details("The engine does not have permission to read or write files");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(HotpatchError::IoFailure {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details("A required file or directory cannot be found");
            }
            _ => {}
        }
    }

    // Fall back to a generic context preserving the error chain text
    ErrorContext::new(HotpatchError::ConfigError { message: format!("{error:#}") })
}

fn create_error_context(error: HotpatchError) -> ErrorContext {
    match &error {
        HotpatchError::NetworkUnavailable { .. } => ErrorContext::new(error)
            .with_suggestion("Check your network connection; the program will run on installed content")
            .with_details("Remote content could not be reached this run"),
        HotpatchError::HashMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Retry the update; if it persists the published package may be corrupt")
            .with_details("Downloaded content failed integrity verification and was discarded"),
        HotpatchError::SizeLimitExceeded { .. } => ErrorContext::new(error)
            .with_suggestion("Reduce bundle content or raise size_limit in hotpatch.toml")
            .with_details("The package descriptor was not written; the build did not complete"),
        HotpatchError::UpdateInProgress { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the other update to finish or remove a stale .update.lock"),
        HotpatchError::SnapshotAlreadyStaged { .. } => ErrorContext::new(error)
            .with_suggestion("Promote or discard the staged snapshot before building again"),
        HotpatchError::BundleNameCollision { .. } => ErrorContext::new(error)
            .with_suggestion("Rename one of the groups or labels; bundle file names are lowercased"),
        _ => ErrorContext::new(error),
    }
}
