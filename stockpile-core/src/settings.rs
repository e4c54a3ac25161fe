//! Run settings.
//!
//! Settings are read from an optional YAML file and overlaid by command-line
//! flags. Every key is optional in the file:
//!
//! ```yaml
//! local-repository: /home/ci/.m2/repository
//! index: com.example.ci:dependency-index
//! alt-index: [":other-leg-index", "org.shared:index"]
//! release-repository: releases::https://repo.example.com/releases
//! snapshot-repository: snapshots::https://repo.example.com/snapshots
//! terminate-at-failure-count: 10
//! reactor:
//!   - com.example:app:1.4.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coordinate::{Coordinate, IndexCoordinate};
use crate::error::{io_err, CoreError};

/// Default width of the synchronization worker pool.
pub const DEFAULT_JOBS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Root of the local package cache. Defaults to `~/.m2/repository`.
    pub local_repository: Option<PathBuf>,
    /// Primary index, owned and republished by this run.
    pub index: Option<IndexCoordinate>,
    /// Read-only indexes shared with other pipelines. `:artifact` inherits the
    /// primary index group.
    pub alt_index: Vec<String>,
    pub skip_resolve_index: bool,
    pub skip_publish_index: bool,
    pub ignore_failures: bool,
    /// Abort once this many bundles have failed. `0` disables.
    pub terminate_at_failure_count: u64,
    pub reactor_aware: bool,
    pub reactor_deploy_snapshots: bool,
    /// Coordinates produced by the current build.
    pub reactor: Vec<Coordinate>,
    /// Stop scanning after this many bundles.
    pub limit_bundle_count: Option<usize>,
    pub jobs: usize,
    /// `id::url` target used for both releases and snapshots unless a
    /// specific one is given.
    pub deploy_repository: Option<String>,
    pub release_repository: Option<String>,
    pub snapshot_repository: Option<String>,
    pub temp_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local_repository: None,
            index: None,
            alt_index: Vec::new(),
            skip_resolve_index: false,
            skip_publish_index: false,
            ignore_failures: false,
            terminate_at_failure_count: 0,
            reactor_aware: true,
            reactor_deploy_snapshots: false,
            reactor: Vec::new(),
            limit_bundle_count: None,
            jobs: DEFAULT_JOBS,
            deploy_repository: None,
            release_repository: None,
            snapshot_repository: None,
            temp_directory: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// Returns `CoreError::Parse` (with path + line context) if malformed.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn local_repository_path(&self) -> Result<PathBuf, CoreError> {
        match &self.local_repository {
            Some(path) => Ok(path.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".m2").join("repository"))
                .ok_or(CoreError::HomeNotFound),
        }
    }

    pub fn index_coordinate(&self) -> Result<&IndexCoordinate, CoreError> {
        self.index.as_ref().ok_or(CoreError::MissingSetting("index"))
    }

    /// Alternate indexes, with the primary index and duplicates removed.
    pub fn alt_index_coordinates(&self) -> Result<Vec<IndexCoordinate>, CoreError> {
        let primary = self.index_coordinate()?;
        let mut result: Vec<IndexCoordinate> = Vec::new();
        for raw in self.alt_index.iter().flat_map(|s| s.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let coordinate = IndexCoordinate::parse_with_default_group(raw, primary.group())?;
            if &coordinate != primary && !result.contains(&coordinate) {
                result.push(coordinate);
            }
        }
        Ok(result)
    }

    /// Release target descriptor: the specific one, else the shared one.
    pub fn release_target(&self) -> Option<&str> {
        first_non_blank(&self.release_repository, &self.deploy_repository)
    }

    /// Snapshot target descriptor: the specific one, else the shared one.
    pub fn snapshot_target(&self) -> Option<&str> {
        first_non_blank(&self.snapshot_repository, &self.deploy_repository)
    }

    pub fn worker_count(&self) -> usize {
        self.jobs.max(1)
    }
}

fn first_non_blank<'a>(specific: &'a Option<String>, shared: &'a Option<String>) -> Option<&'a str> {
    [specific, shared]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
}
