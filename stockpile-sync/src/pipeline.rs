//! Run entry points shared by the `sync` and `scan` commands.
//!
//! Filter order: reactor, completion, primary index, alternate indexes.
//! Completion runs before the indexes so an index drops a bundle only when
//! every file on disk is already recorded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use stockpile_core::{Settings, Stats};

use crate::builder::{BuildOptions, IndexBuilder};
use crate::context::Context;
use crate::error::{io_err, SyncError};
use crate::filter::{apply_chain, BundleFilter, Completion};
use crate::index::Index;
use crate::reactor::ReactorFilter;
use crate::scanner::LocalCache;
use crate::store::StoreTarget;

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Bundles admitted to synchronization.
    pub bundles: usize,
    /// Bundles that produced new index entries.
    pub synchronized: usize,
    pub failures: u64,
    pub index_version: String,
    pub index_published: bool,
    /// Packed index archive. Only reported when the temp directory is kept.
    pub index_archive: Option<PathBuf>,
}

/// One bundle as the filter chain leaves it, for dry runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedBundle {
    pub coordinate: String,
    pub pending: Vec<String>,
    pub synchronized: usize,
    pub required: bool,
}

/// Open the release store and, if configured, the snapshot store.
///
/// HTTP downloads land under `temp_dir/downloads`.
pub fn open_context(settings: &Settings, temp_dir: &Path) -> Result<Context, SyncError> {
    let downloads = temp_dir.join("downloads");
    let release = settings
        .release_target()
        .ok_or_else(|| {
            SyncError::Configuration(
                "no release repository configured; set release-repository or deploy-repository".into(),
            )
        })?
        .parse::<StoreTarget>()?
        .open(&downloads)?;
    let snapshot = settings
        .snapshot_target()
        .map(|raw| raw.parse::<StoreTarget>().and_then(|target| target.open(&downloads)))
        .transpose()?;
    tracing::debug!(
        release = %release.id(),
        snapshot = snapshot.as_ref().map(|s| s.id()).unwrap_or("none"),
        "opened repositories"
    );
    Ok(Context::new(release, snapshot, temp_dir))
}

/// Full run: scan, filter, synchronize, publish.
pub async fn run(settings: &Settings) -> Result<RunSummary, SyncError> {
    let run_dir = RunDir::create(settings)?;
    let context = Arc::new(open_context(settings, run_dir.path())?);
    let mut summary = run_with_context(settings, context).await?;
    if !run_dir.keep {
        summary.index_archive = None;
    }
    Ok(summary)
}

/// Full run against an already opened [`Context`].
pub async fn run_with_context(settings: &Settings, context: Arc<Context>) -> Result<RunSummary, SyncError> {
    let chain = FilterChain::resolve(settings, Some(&context))?;
    if !context.has_snapshot_store() {
        if let Some(coordinate) = chain.reactor.deployable_snapshots().next() {
            return Err(SyncError::Configuration(format!(
                "reactor snapshot {coordinate} would be deployed but no snapshot repository is configured"
            )));
        }
    }

    let options = BuildOptions::from_settings(settings);
    let builder = IndexBuilder::from_index(&chain.primary, Arc::clone(&context))?;
    let cache = local_cache(settings)?;
    let filters = chain.into_filters();
    tracing::info!(
        cache = %cache.root().display(),
        index = %builder.coordinate(),
        jobs = options.jobs,
        "starting synchronization"
    );

    let outcome = builder.build_from(apply_chain(cache.bundles(), &filters), &options).await?;
    let published = builder.finish(outcome.stats, &options)?;
    Ok(summarize(&builder, outcome.admitted, outcome.synchronized, outcome.stats, published))
}

/// Dry run: the bundles a sync would hand to the synchronizer.
///
/// Indexes are resolved when a release repository is configured; without
/// one every index is empty.
pub fn plan(settings: &Settings) -> Result<Vec<PlannedBundle>, SyncError> {
    let run_dir = RunDir::create(settings)?;
    let context = match settings.release_target() {
        Some(_) => Some(open_context(settings, run_dir.path())?),
        None => None,
    };
    plan_with_context(settings, context.as_ref())
}

pub fn plan_with_context(settings: &Settings, context: Option<&Context>) -> Result<Vec<PlannedBundle>, SyncError> {
    let chain = FilterChain::resolve(settings, context)?;
    let cache = local_cache(settings)?;
    let filters = chain.into_filters();
    apply_chain(cache.bundles(), &filters)
        .map(|bundle| -> Result<PlannedBundle, SyncError> {
            let bundle = bundle?;
            Ok(PlannedBundle {
                coordinate: bundle.coordinate().to_string(),
                pending: bundle.pending().into_iter().map(|(name, _)| name.to_owned()).collect(),
                synchronized: bundle.synchronized().len(),
                required: bundle.fail_on_error(),
            })
        })
        .collect()
}

fn local_cache(settings: &Settings) -> Result<LocalCache, SyncError> {
    Ok(LocalCache::new(settings.local_repository_path()?).with_limit(settings.limit_bundle_count))
}

fn summarize(builder: &IndexBuilder, admitted: usize, synchronized: usize, stats: Stats, published: bool) -> RunSummary {
    RunSummary {
        bundles: admitted,
        synchronized,
        failures: stats.failure_count,
        index_version: builder.coordinate().version().to_owned(),
        index_published: published,
        index_archive: Some(builder.archive_path()),
    }
}

struct FilterChain {
    reactor: ReactorFilter,
    primary: Index,
    alternates: Vec<Index>,
}

impl FilterChain {
    fn resolve(settings: &Settings, context: Option<&Context>) -> Result<Self, SyncError> {
        let resolve = |coordinate, enabled| match context {
            Some(context) => Index::resolve(coordinate, context, enabled),
            None => Index::empty(coordinate),
        };
        let primary = resolve(settings.index_coordinate()?.clone(), !settings.skip_resolve_index);
        let alternates = settings
            .alt_index_coordinates()?
            .into_iter()
            .map(|coordinate| resolve(coordinate, true))
            .collect();
        let reactor = ReactorFilter::new(
            settings.reactor.iter().cloned(),
            settings.reactor_aware,
            settings.reactor_deploy_snapshots,
        );
        Ok(Self {
            reactor,
            primary,
            alternates,
        })
    }

    fn into_filters(self) -> Vec<Box<dyn BundleFilter>> {
        let mut filters: Vec<Box<dyn BundleFilter>> =
            vec![Box::new(self.reactor), Box::new(Completion), Box::new(self.primary)];
        filters.extend(
            self.alternates
                .into_iter()
                .map(|index| Box::new(index) as Box<dyn BundleFilter>),
        );
        filters
    }
}

/// Scratch directory for one run. Removed on drop unless it was configured
/// explicitly.
struct RunDir {
    path: PathBuf,
    keep: bool,
}

impl RunDir {
    fn create(settings: &Settings) -> Result<Self, SyncError> {
        let (path, keep) = match &settings.temp_directory {
            Some(dir) => (dir.clone(), true),
            None => {
                let name = format!(
                    "stockpile_{}_{}",
                    Utc::now().format("%Y%m%d%H%M%S"),
                    std::process::id()
                );
                (std::env::temp_dir().join(name), false)
            }
        };
        std::fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;
        Ok(Self { path, keep })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %err, "failed to remove temp directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_context_requires_release_target() {
        let tmp = TempDir::new().unwrap();
        let err = open_context(&Settings::default(), tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)), "got: {err}");
    }

    #[test]
    fn shared_deploy_repository_serves_both_routes() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            deploy_repository: Some(format!("shared::{}", tmp.path().join("remote").display())),
            ..Settings::default()
        };
        let context = open_context(&settings, tmp.path()).unwrap();
        assert!(context.has_snapshot_store());
        assert_eq!(context.release_store().id(), "shared");
    }

    #[test]
    fn explicit_temp_directory_is_kept() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("work");
        let settings = Settings {
            temp_directory: Some(dir.clone()),
            ..Settings::default()
        };
        drop(RunDir::create(&settings).unwrap());
        assert!(dir.is_dir());
    }

    #[test]
    fn default_temp_directory_is_removed() {
        let run_dir = RunDir::create(&Settings::default()).unwrap();
        let path = run_dir.path().to_path_buf();
        assert!(path.is_dir());
        drop(run_dir);
        assert!(!path.exists());
    }

    #[test]
    fn plan_without_release_target_uses_empty_indexes() {
        let cache = TempDir::new().unwrap();
        let dir = cache.path().join("com/widget/1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("widget-1.pom"), "pom").unwrap();
        std::fs::write(dir.join("widget-1.jar"), "jar").unwrap();
        let settings = Settings {
            local_repository: Some(cache.path().to_path_buf()),
            index: Some("com.ci:index".parse().unwrap()),
            ..Settings::default()
        };

        let planned = plan_with_context(&settings, None).unwrap();
        assert_eq!(
            planned,
            vec![PlannedBundle {
                coordinate: "com:widget:1".into(),
                pending: vec!["widget-1.pom".into(), "widget-1.jar".into()],
                synchronized: 0,
                required: false,
            }]
        );
    }
}
