//! Synchronizer: routes deploys to the release or snapshot store and runs
//! the per-bundle bulk-then-fallback algorithm.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stockpile_core::{ArtifactKey, Coordinate, Item};

use crate::error::{DeployError, StoreError, SyncFailure};
use crate::store::RemoteStore;

#[derive(Debug, Clone)]
pub struct Context {
    release: Arc<dyn RemoteStore>,
    snapshot: Option<Arc<dyn RemoteStore>>,
    temp_dir: PathBuf,
}

impl Context {
    pub fn new(
        release: Arc<dyn RemoteStore>,
        snapshot: Option<Arc<dyn RemoteStore>>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            release,
            snapshot,
            temp_dir: temp_dir.into(),
        }
    }

    /// Run-scoped scratch directory.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn release_store(&self) -> &Arc<dyn RemoteStore> {
        &self.release
    }

    pub fn has_snapshot_store(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Deploy `items` to the store selected by `coordinate`.
    pub fn deploy(&self, coordinate: &Coordinate, items: &[Item]) -> Result<(), DeployError> {
        let store = if coordinate.is_snapshot() {
            self.snapshot
                .as_ref()
                .ok_or_else(|| DeployError::NoSnapshotTarget(coordinate.clone()))?
        } else {
            &self.release
        };
        tracing::debug!(store = %store.id(), %coordinate, items = items.len(), "deploying");
        store.deploy(items).map_err(DeployError::from)
    }

    /// Ask the release store for `key`.
    pub fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        self.release.resolve(key)
    }

    pub fn latest_version(&self, group: &str, artifact: &str) -> Result<Option<String>, StoreError> {
        self.release.latest_version(group, artifact)
    }

    /// Synchronize one bundle's pending items.
    ///
    /// A single bulk deploy is tried first. If it fails, snapshots fail fast
    /// with the failure attributed to the first item; releases fall back to
    /// resolve-then-deploy for each item and fail on the first item for which
    /// both are exhausted.
    pub fn sync_all(&self, coordinate: &Coordinate, items: &[Item]) -> Result<(), SyncFailure> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        let bulk = match self.deploy(coordinate, items) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if coordinate.is_snapshot() {
            return Err(SyncFailure {
                coordinate: coordinate.clone(),
                file: first.file_name(),
                cause: bulk,
            });
        }
        tracing::debug!(%coordinate, error = %bulk, "bulk deploy failed, falling back to per-item sync");

        for item in items {
            match self.resolve(&item.key) {
                Ok(_) => {
                    tracing::debug!(key = %item.key, "already present remotely");
                    continue;
                }
                Err(err) => tracing::trace!(key = %item.key, error = %err, "not resolvable"),
            }
            if let Err(cause) = self.deploy(coordinate, std::slice::from_ref(item)) {
                return Err(SyncFailure {
                    coordinate: coordinate.clone(),
                    file: item.file_name(),
                    cause,
                });
            }
        }
        Ok(())
    }
}
