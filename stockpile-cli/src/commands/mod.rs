//! Subcommands and the settings flags they share.

pub mod scan;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stockpile_core::{Coordinate, IndexCoordinate, Settings};

/// Settings flags. Each one overrides the matching key of `--config`.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// YAML settings file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root of the local package cache (default: ~/.m2/repository).
    #[arg(long, value_name = "DIR")]
    pub local_repository: Option<PathBuf>,

    /// Index owned by this pipeline, as group:artifact.
    #[arg(long, value_name = "GROUP:ARTIFACT")]
    pub index: Option<IndexCoordinate>,

    /// Read-only indexes of other pipelines; `:artifact` inherits the index group.
    #[arg(long, value_name = "COORDS")]
    pub alt_index: Vec<String>,

    /// Repository for both releases and snapshots, as id::url.
    #[arg(long, value_name = "ID::URL")]
    pub deploy_repository: Option<String>,

    #[arg(long, value_name = "ID::URL")]
    pub release_repository: Option<String>,

    #[arg(long, value_name = "ID::URL")]
    pub snapshot_repository: Option<String>,

    /// Start from an empty index instead of the latest published one.
    #[arg(long)]
    pub skip_resolve_index: bool,

    /// Build the index but do not upload it.
    #[arg(long)]
    pub skip_publish_index: bool,

    /// Exit successfully even if some bundles failed.
    #[arg(long)]
    pub ignore_failures: bool,

    /// Stop after this many failed bundles (0 disables).
    #[arg(long, value_name = "N")]
    pub terminate_at_failure_count: Option<u64>,

    /// Treat no coordinate as produced by this build.
    #[arg(long)]
    pub no_reactor: bool,

    /// Coordinate produced by this build, as group:artifact:version.
    #[arg(long, value_name = "COORD")]
    pub reactor: Vec<Coordinate>,

    /// Also deploy snapshot coordinates produced by this build.
    #[arg(long)]
    pub reactor_deploy_snapshots: bool,

    /// Stop scanning after this many bundles.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Concurrent uploads.
    #[arg(long, short, value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep run files here instead of a removed temp directory.
    #[arg(long, value_name = "DIR")]
    pub temp_directory: Option<PathBuf>,
}

impl SettingsArgs {
    /// Settings from `--config` (or defaults) overlaid with the given flags.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_at(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => Settings::default(),
        };

        if let Some(path) = &self.local_repository {
            settings.local_repository = Some(path.clone());
        }
        if let Some(index) = &self.index {
            settings.index = Some(index.clone());
        }
        if !self.alt_index.is_empty() {
            settings.alt_index = self.alt_index.clone();
        }
        override_string(&mut settings.deploy_repository, &self.deploy_repository);
        override_string(&mut settings.release_repository, &self.release_repository);
        override_string(&mut settings.snapshot_repository, &self.snapshot_repository);
        settings.skip_resolve_index |= self.skip_resolve_index;
        settings.skip_publish_index |= self.skip_publish_index;
        settings.ignore_failures |= self.ignore_failures;
        if let Some(count) = self.terminate_at_failure_count {
            settings.terminate_at_failure_count = count;
        }
        if self.no_reactor {
            settings.reactor_aware = false;
        }
        if !self.reactor.is_empty() {
            settings.reactor = self.reactor.clone();
        }
        settings.reactor_deploy_snapshots |= self.reactor_deploy_snapshots;
        if self.limit.is_some() {
            settings.limit_bundle_count = self.limit;
        }
        if let Some(jobs) = self.jobs {
            settings.jobs = jobs;
        }
        if let Some(dir) = &self.temp_directory {
            settings.temp_directory = Some(dir.clone());
        }

        settings
            .index_coordinate()
            .context("no index configured; pass --index group:artifact or set `index` in the settings file")?;
        Ok(settings)
    }
}

fn override_string(target: &mut Option<String>, flag: &Option<String>) {
    if let Some(value) = flag {
        *target = Some(value.clone());
    }
}

/// Multi-threaded runtime for the async pipeline.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stockpile.yaml");
        std::fs::write(
            &path,
            "index: com.ci:index\njobs: 8\nrelease-repository: file::/srv/a\nignore-failures: false\n",
        )
        .unwrap();
        let args = SettingsArgs {
            config: Some(path),
            release_repository: Some("other::/srv/b".into()),
            ignore_failures: true,
            no_reactor: true,
            ..SettingsArgs::default()
        };

        let settings = args.settings().unwrap();
        assert_eq!(settings.jobs, 8);
        assert_eq!(settings.release_repository.as_deref(), Some("other::/srv/b"));
        assert!(settings.ignore_failures);
        assert!(!settings.reactor_aware);
    }

    #[test]
    fn index_is_required() {
        let err = SettingsArgs::default().settings().unwrap_err();
        assert!(err.to_string().contains("no index configured"));
    }
}
