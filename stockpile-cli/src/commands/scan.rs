//! `stockpile scan`: dry run of the filter chain.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use stockpile_sync::{pipeline, PlannedBundle};

use super::SettingsArgs;

/// Arguments for `stockpile scan`.
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.settings.settings()?;
        let planned = pipeline::plan(&settings).context("scan failed")?;
        tracing::debug!(bundles = planned.len(), "scan complete");

        if self.json {
            print_json(planned)?;
        } else {
            print_table(planned);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ScanReportJson {
    bundles: usize,
    files: usize,
    planned: Vec<PlannedBundle>,
}

#[derive(Tabled)]
struct ScanTableRow {
    #[tabled(rename = "coordinate")]
    coordinate: String,
    #[tabled(rename = "pending")]
    pending: usize,
    #[tabled(rename = "indexed")]
    synchronized: usize,
    #[tabled(rename = "required")]
    required: String,
}

fn print_json(planned: Vec<PlannedBundle>) -> Result<()> {
    let payload = ScanReportJson {
        bundles: planned.len(),
        files: planned.iter().map(|b| b.pending.len()).sum(),
        planned,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize scan JSON")?
    );
    Ok(())
}

fn print_table(planned: Vec<PlannedBundle>) {
    if planned.is_empty() {
        println!("{} nothing to synchronize", "✓".green().bold());
        return;
    }
    let files: usize = planned.iter().map(|b| b.pending.len()).sum();
    let bundles = planned.len();
    let rows: Vec<ScanTableRow> = planned
        .into_iter()
        .map(|b| ScanTableRow {
            coordinate: b.coordinate,
            pending: b.pending.len(),
            synchronized: b.synchronized,
            required: if b.required { "yes".to_string() } else { String::new() },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{bundles} bundles, {files} files to synchronize");
}
