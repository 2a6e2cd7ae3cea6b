//! Hotpatch CLI entry point
//!
//! Parses command-line arguments, executes the selected command, and renders
//! failures through the user-friendly error layer. Commands:
//! - `export` - export the authored content declaration to a packaging manifest
//! - `pack` - organize raw build output into a versioned package
//! - `update` - check for and apply a content update
//! - `status` - show the installed content version

use anyhow::Result;
use clap::Parser;
use hotpatch_cli::cli;
use hotpatch_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
