//! Local cache scanner.
//!
//! Walks a `<group segments>/<artifact>/<version>/` tree and emits one
//! descriptor-only [`Bundle`] per version directory that holds an
//! `<artifact>-<version>.pom`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use stockpile_core::{ArtifactKey, Bundle, Coordinate, Item, Metadata, DESCRIPTOR_TYPE};

use crate::error::SyncError;
use crate::filter::BundleStream;

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
    limit: Option<usize>,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limit: None,
        }
    }

    /// Stop after `limit` bundles.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the cache.
    ///
    /// A failure to read the root itself is yielded as [`SyncError::Scan`];
    /// unreadable entries below it are skipped with a warning.
    pub fn bundles(&self) -> BundleStream<'static> {
        let scan = Scan {
            root: self.root.clone(),
            walk: WalkDir::new(&self.root).sort_by_file_name().into_iter(),
            done: false,
        };
        match self.limit {
            Some(limit) => Box::new(scan.take(limit)),
            None => Box::new(scan),
        }
    }
}

struct Scan {
    root: PathBuf,
    walk: walkdir::IntoIter,
    done: bool,
}

impl Iterator for Scan {
    type Item = Result<Bundle, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    self.done = true;
                    return Some(Err(SyncError::Scan {
                        path: self.root.clone(),
                        source: err,
                    }));
                }
                Err(err) => {
                    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!(%path, error = %err, "skipping unreadable cache entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(bundle) = descriptor_bundle(&self.root, entry.path()) else {
                continue;
            };
            // One bundle per version directory.
            self.walk.skip_current_dir();
            return Some(Ok(bundle));
        }
    }
}

/// Build a descriptor-only bundle if `path` is `<group>/<a>/<v>/<a>-<v>.pom`.
fn descriptor_bundle(root: &Path, path: &Path) -> Option<Bundle> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let [group @ .., artifact, version, file_name] = segments.as_slice() else {
        return None;
    };
    if group.is_empty() {
        return None;
    }
    let expected = format!("{artifact}-{version}.{DESCRIPTOR_TYPE}");
    if *file_name != expected {
        return None;
    }

    let coordinate = Coordinate::new(group.join("."), artifact.as_str(), version.as_str());
    let key = ArtifactKey::new(coordinate.clone(), DESCRIPTOR_TYPE, None);
    let descriptor = Item::new(key, path).with_metadata(Metadata::VersionListing);
    // Keyed by where the bundle actually lives, not by the coordinate.
    Some(Bundle::new(relative.parent()?, descriptor))
}
