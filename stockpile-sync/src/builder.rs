//! Index builder: synchronizes filtered bundles on a bounded worker pool,
//! records successes in the run's index directory, and publishes the
//! repacked index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};

use stockpile_core::{ArtifactKey, Bundle, Coordinate, Item, Metadata, Settings, Stats, DESCRIPTOR_TYPE};

use crate::archive;
use crate::context::Context;
use crate::error::{io_err, DeployError, SyncError};
use crate::filter::BundleStream;
use crate::index::{Index, INDEX_ARCHIVE_TYPE};

/// Knobs for [`IndexBuilder::build_from`] and [`IndexBuilder::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Width of the synchronization worker pool. At least one.
    pub jobs: usize,
    /// Stop admitting bundles once this many have failed. `0` disables.
    pub terminate_at_failure_count: u64,
    pub skip_publish_index: bool,
    pub ignore_failures: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: stockpile_core::settings::DEFAULT_JOBS,
            terminate_at_failure_count: 0,
            skip_publish_index: false,
            ignore_failures: false,
        }
    }
}

impl BuildOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            jobs: settings.worker_count(),
            terminate_at_failure_count: settings.terminate_at_failure_count,
            skip_publish_index: settings.skip_publish_index,
            ignore_failures: settings.ignore_failures,
        }
    }
}

/// What a build pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub stats: Stats,
    /// Bundles handed to a worker.
    pub admitted: usize,
    /// Bundles that produced new index entries.
    pub synchronized: usize,
}

#[derive(Debug)]
pub struct IndexBuilder {
    coordinate: Coordinate,
    index_dir: PathBuf,
    context: Arc<Context>,
    worker: Arc<Worker>,
}

impl IndexBuilder {
    /// Start a builder for `index` under a freshly minted `vYYYYMMDDHHMMSS`
    /// version.
    pub fn from_index(index: &Index, context: Arc<Context>) -> Result<Self, SyncError> {
        let version = Utc::now().format("v%Y%m%d%H%M%S").to_string();
        Self::with_version(index, version, context)
    }

    /// Start a builder publishing `index` as `version`.
    ///
    /// The index directory is seeded from the index's archive when it has
    /// one and created empty otherwise.
    pub fn with_version(index: &Index, version: impl Into<String>, context: Arc<Context>) -> Result<Self, SyncError> {
        let coordinate = index.coordinate().at_version(version);
        let index_dir = context.temp_dir().join(format!("{}.dir", coordinate.base_name()));
        if index_dir.exists() {
            std::fs::remove_dir_all(&index_dir).map_err(|e| io_err(&index_dir, e))?;
        }
        match index.archive() {
            Some(archive) => archive::unpack(archive, &index_dir)?,
            None => std::fs::create_dir_all(&index_dir).map_err(|e| io_err(&index_dir, e))?,
        }
        tracing::debug!(index = %coordinate, dir = %index_dir.display(), "prepared index directory");

        let worker = Arc::new(Worker {
            context: Arc::clone(&context),
            index_dir: index_dir.clone(),
        });
        Ok(Self {
            coordinate,
            index_dir,
            context,
            worker,
        })
    }

    /// Coordinate the rebuilt index is published under.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Where [`IndexBuilder::finish`] packs the index.
    pub fn archive_path(&self) -> PathBuf {
        self.context
            .temp_dir()
            .join(format!("{}.{INDEX_ARCHIVE_TYPE}", self.coordinate.base_name()))
    }

    /// Synchronize every bundle of `bundles`, at most `options.jobs` at once.
    ///
    /// Admission stops on the first fatal error or once the failure
    /// threshold is reached; bundles already in flight always finish.
    pub async fn build_from(&self, mut bundles: BundleStream<'_>, options: &BuildOptions) -> Result<BuildOutcome, SyncError> {
        let jobs = options.jobs.max(1);
        let threshold = options.terminate_at_failure_count;
        let mut tasks: JoinSet<Result<Stats, SyncError>> = JoinSet::new();
        let mut tally = Tally::default();

        loop {
            while tasks.len() >= jobs {
                match tasks.join_next().await {
                    Some(joined) => tally.record(joined),
                    None => break,
                }
            }
            if tally.should_stop(threshold) {
                break;
            }
            let Some(bundle) = bundles.next() else {
                break;
            };
            let bundle = match bundle {
                Ok(bundle) => bundle,
                Err(err) => {
                    tally.fatal = Some(err);
                    break;
                }
            };
            // Pulling a bundle can block on the scan; fold whatever finished
            // meanwhile before admitting it.
            while let Some(joined) = tasks.try_join_next() {
                tally.record(joined);
            }
            if tally.should_stop(threshold) {
                tracing::debug!(coordinate = %bundle.coordinate(), "not admitted, run is stopping");
                break;
            }
            tally.outcome.admitted += 1;
            let worker = Arc::clone(&self.worker);
            tasks.spawn_blocking(move || worker.sync_bundle(bundle));
        }

        while let Some(joined) = tasks.join_next().await {
            tally.record(joined);
        }

        if let Some(err) = tally.fatal {
            return Err(err);
        }
        let outcome = tally.outcome;
        if outcome.stats.reached(threshold) {
            tracing::error!(failures = outcome.stats.failure_count, threshold, "failure threshold reached");
            return Err(SyncError::FailureThreshold {
                count: outcome.stats.failure_count,
                threshold,
            });
        }
        tracing::info!(
            admitted = outcome.admitted,
            synchronized = outcome.synchronized,
            failures = outcome.stats.failure_count,
            "synchronization finished"
        );
        Ok(outcome)
    }

    /// Pack the index directory and publish it when `stats` is dirty.
    ///
    /// Returns whether the index was published. Accumulated failures are an
    /// error afterwards unless `options.ignore_failures` is set.
    pub fn finish(&self, stats: Stats, options: &BuildOptions) -> Result<bool, SyncError> {
        let archive = self.archive_path();
        archive::pack_dir(&self.index_dir, &archive)?;

        let published = if !stats.dirty {
            tracing::info!(index = %self.coordinate, "index unchanged, not publishing");
            false
        } else if options.skip_publish_index {
            tracing::info!(index = %self.coordinate, archive = %archive.display(), "index publishing skipped");
            false
        } else {
            self.publish(&archive)?;
            true
        };

        if stats.failure_count > 0 {
            if options.ignore_failures {
                tracing::warn!(failures = stats.failure_count, "ignoring failed bundles");
            } else {
                return Err(SyncError::Failures {
                    count: stats.failure_count,
                });
            }
        }
        Ok(published)
    }

    fn publish(&self, archive: &Path) -> Result<(), SyncError> {
        let publish_err = |source: DeployError| SyncError::Publish {
            coordinate: self.coordinate.clone(),
            source,
        };
        let descriptor_key = ArtifactKey::new(self.coordinate.clone(), DESCRIPTOR_TYPE, None);
        let descriptor_path = self.context.temp_dir().join(descriptor_key.file_name());
        std::fs::write(&descriptor_path, descriptor_xml(&self.coordinate)).map_err(|e| io_err(&descriptor_path, e))?;

        let items = [
            Item::new(descriptor_key, descriptor_path).with_metadata(Metadata::VersionListing),
            Item::new(
                ArtifactKey::new(self.coordinate.clone(), INDEX_ARCHIVE_TYPE, None),
                archive,
            )
            .with_metadata(Metadata::VersionListing),
        ];
        self.context.deploy(&self.coordinate, &items).map_err(publish_err)?;
        tracing::info!(index = %self.coordinate, "published index");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Tally {
    outcome: BuildOutcome,
    fatal: Option<SyncError>,
}

impl Tally {
    fn should_stop(&self, threshold: u64) -> bool {
        self.fatal.is_some() || self.outcome.stats.reached(threshold)
    }

    fn record(&mut self, joined: Result<Result<Stats, SyncError>, JoinError>) {
        match joined {
            Ok(Ok(stats)) => {
                if stats.dirty {
                    self.outcome.synchronized += 1;
                }
                self.outcome.stats = self.outcome.stats.combine(stats);
            }
            Ok(Err(err)) => {
                self.fatal.get_or_insert(err);
            }
            Err(err) => {
                self.fatal.get_or_insert(SyncError::Worker(err.to_string()));
            }
        }
    }
}

/// Per-bundle synchronization, run on the blocking pool.
#[derive(Debug)]
struct Worker {
    context: Arc<Context>,
    index_dir: PathBuf,
}

impl Worker {
    fn sync_bundle(&self, bundle: Bundle) -> Result<Stats, SyncError> {
        let items: Vec<Item> = bundle.pending().into_iter().map(|(_, item)| item.clone()).collect();
        if items.is_empty() {
            return Ok(Stats::NOOP);
        }
        let coordinate = bundle.coordinate();

        match self.context.sync_all(coordinate, &items) {
            Ok(()) if bundle.is_snapshot() => {
                tracing::debug!(%coordinate, "snapshot synchronized, not indexed");
                Ok(Stats::NOOP)
            }
            Ok(()) => {
                self.write_entry(&bundle)?;
                tracing::debug!(%coordinate, items = items.len(), "synchronized");
                Ok(Stats::DIRTY)
            }
            Err(failure) if matches!(failure.cause, DeployError::NoSnapshotTarget(_)) => {
                Err(SyncError::Configuration(failure.cause.to_string()))
            }
            Err(failure) if bundle.fail_on_error() => Err(SyncError::RequiredBundle {
                coordinate: coordinate.clone(),
                source: failure,
            }),
            Err(failure) => {
                tracing::warn!(%coordinate, file = %failure.file, "bundle failed to synchronize");
                tracing::debug!(%coordinate, error = %failure, cause = %failure.cause, "synchronization failure detail");
                Ok(Stats::FAILED)
            }
        }
    }

    /// Record every name of `bundle` as synchronized, one per line, sorted.
    fn write_entry(&self, bundle: &Bundle) -> Result<(), SyncError> {
        let names: BTreeSet<&str> = bundle
            .synchronized()
            .iter()
            .chain(bundle.deployables().keys())
            .map(String::as_str)
            .collect();
        let mut contents = String::new();
        for name in names {
            contents.push_str(name);
            contents.push('\n');
        }

        let path = self.index_dir.join(bundle.index_file_rel_path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = path.with_extension("txt.tmp");
        std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        Ok(())
    }
}

fn descriptor_xml(coordinate: &Coordinate) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n\
         \x20 <modelVersion>4.0.0</modelVersion>\n\
         \x20 <groupId>{}</groupId>\n\
         \x20 <artifactId>{}</artifactId>\n\
         \x20 <version>{}</version>\n\
         \x20 <packaging>pom</packaging>\n\
         </project>\n",
        coordinate.group(),
        coordinate.artifact(),
        coordinate.version()
    )
}
