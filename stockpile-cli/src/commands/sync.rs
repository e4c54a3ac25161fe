//! `stockpile sync`: upload new bundles and publish the updated index.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use stockpile_sync::{pipeline, RunSummary};

use super::{runtime, SettingsArgs};

/// Arguments for `stockpile sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Emit the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.settings.settings()?;
        tracing::debug!(
            index = ?settings.index,
            release = settings.release_target().unwrap_or("-"),
            snapshot = settings.snapshot_target().unwrap_or("-"),
            jobs = settings.worker_count(),
            "sync settings resolved"
        );
        let summary = runtime()?
            .block_on(pipeline::run(&settings))
            .context("sync failed")?;
        tracing::info!(
            bundles = summary.bundles,
            synchronized = summary.synchronized,
            failures = summary.failures,
            index_version = %summary.index_version,
            published = summary.index_published,
            "sync complete"
        );

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary JSON")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    let mark = if summary.failures > 0 {
        "!".yellow().bold()
    } else {
        "✓".green().bold()
    };
    println!(
        "{mark} {} bundles synchronized, {} unchanged, {} failed",
        summary.synchronized,
        summary
            .bundles
            .saturating_sub(summary.synchronized)
            .saturating_sub(summary.failures as usize),
        summary.failures
    );
    if summary.index_published {
        println!("  index {} published", summary.index_version.bold());
    } else {
        println!("  index {} not published", summary.index_version.dimmed());
    }
    if let Some(archive) = &summary.index_archive {
        println!("  archive {}", archive.display());
    }
}
