//! Command-line interface for the hotpatch engine.
//!
//! Each command lives in its own module with its own argument structure and
//! execution logic:
//!
//! - `export` - turn an authored content declaration into the exported
//!   manifest consumed at packaging time
//! - `pack` - organize raw build output into a versioned, publishable package
//! - `update` - run the client update flow against a published remote root
//! - `status` - inspect the installed content set
//!
//! # Typical workflow
//!
//! ```bash
//! # Build side, run per release:
//! hotpatch export --content content.toml --out build/
//! hotpatch pack --content content.toml --raw-dir build/raw --out publish/
//!
//! # Client side, run at program start:
//! hotpatch update
//! hotpatch status
//! ```
//!
//! All commands support `--verbose`/`--quiet` for log level, `--config` for
//! a non-default `hotpatch.toml`, and `--no-progress` to disable animated
//! output (also auto-disabled when stderr is not a terminal).

mod export;
mod pack;
mod status;
mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Top-level CLI for the hotpatch content update engine.
#[derive(Parser)]
#[command(
    name = "hotpatch",
    about = "Incremental content updates: export, pack, and apply hotfix packages",
    version
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level log output. Equivalent to `RUST_LOG=debug`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress everything except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file (default: ./hotpatch.toml, falling back
    /// to built-in defaults when absent).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Export the authored content declaration to a packaging manifest
    Export(export::ExportCommand),
    /// Organize raw build output into a versioned package
    Pack(pack::PackCommand),
    /// Check for and apply a content update
    Update(update::UpdateCommand),
    /// Show the installed content version and layout
    Status(status::StatusCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        if self.no_progress {
            // Read by the progress layer when constructing bars.
            unsafe { std::env::set_var("HOTPATCH_NO_PROGRESS", "1") };
        }
        self.init_logging();

        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Export(cmd) => cmd.execute().await,
            Commands::Pack(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Status(cmd) => cmd.execute(&config).await,
        }
    }

    fn init_logging(&self) {
        let default_directive =
            if self.verbose { "debug" } else if self.quiet { "error" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        // Ignore the error if a subscriber is already installed (tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}
