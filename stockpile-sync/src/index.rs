//! Read side of an index: a filter that removes already-synchronized files
//! from bundles.
//!
//! An index archive holds one `<layout prefix>.txt` entry per bundle, listing
//! the file names known to be present remotely, one per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stockpile_core::{ArtifactKey, Bundle, IndexCoordinate, DESCRIPTOR_TYPE};

use crate::archive;
use crate::context::Context;
use crate::error::{IndexParseError, SyncError};
use crate::filter::{BundleFilter, BundleStream};

/// Artifact type of a published index archive.
pub const INDEX_ARCHIVE_TYPE: &str = "tar.gz";

#[derive(Debug, Clone)]
pub struct Index {
    coordinate: IndexCoordinate,
    version: Option<String>,
    archive: Option<PathBuf>,
    entries: HashMap<String, Vec<u8>>,
}

impl Index {
    /// An index with no backing archive. Filters nothing but itself.
    pub fn empty(coordinate: IndexCoordinate) -> Self {
        Self {
            coordinate,
            version: None,
            archive: None,
            entries: HashMap::new(),
        }
    }

    /// Load every entry of `archive`.
    pub fn from_archive(
        coordinate: IndexCoordinate,
        version: Option<String>,
        archive: impl Into<PathBuf>,
    ) -> Result<Self, SyncError> {
        let archive = archive.into();
        let entries = archive::read_entries(&archive)?;
        Ok(Self {
            coordinate,
            version,
            archive: Some(archive),
            entries,
        })
    }

    /// Resolve the latest published version of `coordinate` from the release
    /// store.
    ///
    /// Best effort: when `enabled` is false, nothing is published yet, or
    /// resolution fails, the result is an empty index.
    pub fn resolve(coordinate: IndexCoordinate, context: &Context, enabled: bool) -> Self {
        if !enabled {
            tracing::info!(index = %coordinate, "index resolution skipped");
            return Self::empty(coordinate);
        }
        match Self::try_resolve(&coordinate, context) {
            Ok(Some(index)) => {
                tracing::info!(
                    index = %coordinate,
                    version = index.version.as_deref().unwrap_or_default(),
                    entries = index.len(),
                    "resolved index"
                );
                index
            }
            Ok(None) => {
                tracing::info!(index = %coordinate, "no published index, starting empty");
                Self::empty(coordinate)
            }
            Err(err) => {
                tracing::warn!(index = %coordinate, error = %err, "could not resolve index, starting empty");
                Self::empty(coordinate)
            }
        }
    }

    fn try_resolve(coordinate: &IndexCoordinate, context: &Context) -> Result<Option<Self>, SyncError> {
        let Some(version) = context.latest_version(coordinate.group(), coordinate.artifact())? else {
            return Ok(None);
        };
        let published = coordinate.at_version(&version);
        context.resolve(&ArtifactKey::new(published.clone(), DESCRIPTOR_TYPE, None))?;
        let archive = context.resolve(&ArtifactKey::new(published, INDEX_ARCHIVE_TYPE, None))?;
        Self::from_archive(coordinate.clone(), Some(version), archive).map(Some)
    }

    pub fn coordinate(&self) -> &IndexCoordinate {
        &self.coordinate
    }

    /// Version the archive was published under, if one was resolved.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File names recorded for `bundle`, or `None` when there is no entry.
    pub fn entry(&self, bundle: &Bundle) -> Option<Result<Vec<String>, IndexParseError>> {
        let name = bundle.index_entry_name();
        self.entries.get(&name).map(|raw| parse_entry(&name, raw))
    }

    fn narrow(&self, bundle: Bundle) -> Option<Bundle> {
        if self.coordinate.matches(bundle.coordinate()) {
            tracing::debug!(coordinate = %bundle.coordinate(), "skipping the index itself");
            return None;
        }
        if self.archive.is_none() {
            return Some(bundle);
        }
        let names = match self.entry(&bundle) {
            None => return Some(bundle),
            Some(Ok(names)) => names,
            Some(Err(err)) => {
                tracing::warn!(index = %self.coordinate, error = %err, "ignoring unreadable index entry");
                return Some(bundle);
            }
        };
        let filtered = bundle.filtered_by_index(names);
        if filtered.deployables().is_empty() {
            tracing::trace!(coordinate = %filtered.coordinate(), index = %self.coordinate, "already synchronized");
            return None;
        }
        Some(filtered)
    }
}

impl BundleFilter for Index {
    fn label(&self) -> String {
        format!("index {}", self.coordinate)
    }

    fn apply<'a>(&'a self, bundles: BundleStream<'a>) -> BundleStream<'a> {
        Box::new(bundles.filter_map(move |bundle| match bundle {
            Ok(bundle) => self.narrow(bundle).map(Ok),
            Err(err) => Some(Err(err)),
        }))
    }
}

/// Parse one entry: newline-separated bare file names. Blank lines are
/// ignored.
pub fn parse_entry(entry: &str, raw: &[u8]) -> Result<Vec<String>, IndexParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| IndexParseError::Encoding {
        entry: entry.to_owned(),
    })?;
    let mut names = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "." || line == ".." || line.contains(|c: char| c == '/' || c == '\\') {
            return Err(IndexParseError::InvalidName {
                entry: entry.to_owned(),
                line: line.to_owned(),
            });
        }
        names.push(line.to_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply_chain, Completion};
    use crate::scanner::LocalCache;
    use tempfile::TempDir;

    fn cache_with(files: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for rel in files {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, rel).unwrap();
        }
        tmp
    }

    fn index_with(entries: &[(&str, &str)]) -> (TempDir, Index) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, body) in entries {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let archive = tmp.path().join("index.tar.gz");
        archive::pack_dir(&dir, &archive).unwrap();
        let index = Index::from_archive(IndexCoordinate::new("com.ci", "index"), None, archive).unwrap();
        (tmp, index)
    }

    fn pending(cache: &TempDir, index: Index) -> Vec<(String, Vec<String>)> {
        let filters: Vec<Box<dyn BundleFilter>> = vec![Box::new(Completion), Box::new(index)];
        let mut out: Vec<(String, Vec<String>)> = apply_chain(LocalCache::new(cache.path()).bundles(), &filters)
            .map(|b| {
                let b = b.unwrap();
                (b.coordinate().to_string(), b.deployables().keys().cloned().collect())
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn listed_files_are_removed_from_deployables() {
        let cache = cache_with(&["com/widget/1/widget-1.pom", "com/widget/1/widget-1.jar"]);
        let (_tmp, index) = index_with(&[("com/widget/1.txt", "widget-1.jar\n")]);
        assert_eq!(
            pending(&cache, index),
            vec![("com:widget:1".to_string(), vec!["widget-1.pom".to_string()])]
        );
    }

    #[test]
    fn fully_synchronized_bundles_are_dropped() {
        let cache = cache_with(&["com/widget/1/widget-1.pom", "com/widget/1/widget-1.jar"]);
        let (_tmp, index) = index_with(&[("com/widget/1.txt", "widget-1.pom\r\nwidget-1.jar\n\n")]);
        assert!(pending(&cache, index).is_empty());
    }

    #[test]
    fn unreadable_entries_pass_bundles_through() {
        let cache = cache_with(&["com/widget/1/widget-1.pom", "com/gadget/2/gadget-2.pom"]);
        let (_tmp, index) = index_with(&[
            ("com/widget/1.txt", "../../etc/passwd\n"),
            ("com/gadget/2.txt", ""),
        ]);
        let result = pending(&cache, index);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|(_, names)| names.len() == 1));
    }

    #[test]
    fn empty_index_only_drops_itself() {
        let cache = cache_with(&[
            "com/ci/index/v20200101000000/index-v20200101000000.pom",
            "com/widget/1/widget-1.pom",
        ]);
        let index = Index::empty(IndexCoordinate::new("com.ci", "index"));
        assert_eq!(
            pending(&cache, index),
            vec![("com:widget:1".to_string(), vec!["widget-1.pom".to_string()])]
        );
    }

    #[test]
    fn parse_entry_rejects_paths_and_bad_encoding() {
        assert_eq!(parse_entry("e", b"a.pom\n b.jar \n").unwrap(), ["a.pom", "b.jar"]);
        assert!(matches!(parse_entry("e", b"x/a.pom"), Err(IndexParseError::InvalidName { .. })));
        assert!(matches!(parse_entry("e", b".."), Err(IndexParseError::InvalidName { .. })));
        assert!(matches!(parse_entry("e", &[0xff, 0xfe]), Err(IndexParseError::Encoding { .. })));
    }
}
