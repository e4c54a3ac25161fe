//! Stockpile: mirror a local package cache to a remote artifact store.
//!
//! # Usage
//!
//! ```text
//! stockpile sync --index com.example.ci:dependency-index \
//!     --release-repository releases::https://repo.example.com/releases [--json]
//! stockpile scan --index com.example.ci:dependency-index [--json]
//! stockpile <command> --config stockpile.yaml [flags overriding the file]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{scan::ScanArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stockpile",
    version,
    about = "Mirror a local package cache to a remote artifact store",
    long_about = None,
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload every bundle the index does not already record, then publish
    /// the updated index.
    Sync(SyncArgs),

    /// Show which bundles a sync would upload, without uploading anything.
    Scan(ScanArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Scan(args) => args.run(),
    }
}

/// Logs go to stderr; stdout carries the summary.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
