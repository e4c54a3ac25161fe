//! Bundles: one version directory's worth of artifacts.
//!
//! Every transformation here consumes a [`Bundle`] and returns a new one; no
//! operation mutates a bundle that another stage can observe. The
//! `deployables` and `synchronized` name sets are kept disjoint by every
//! constructor and transformation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::coordinate::{ArtifactKey, Coordinate};

/// Suffix of the marker files a resolver leaves behind for an interrupted or
/// failed download. Such files are never part of a bundle's payload.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".lastUpdated";

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Tags a store honours when an item is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metadata {
    /// Record the item's version in the artifact's version listing.
    VersionListing,
}

/// A single file on disk together with the key it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: ArtifactKey,
    pub file: PathBuf,
    pub metadata: Vec<Metadata>,
}

impl Item {
    pub fn new(key: ArtifactKey, file: impl Into<PathBuf>) -> Self {
        Self {
            key,
            file: file.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        if !self.metadata.contains(&metadata) {
            self.metadata.push(metadata);
        }
        self
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.key.coordinate
    }

    /// Bare file name of the item, which keys it within its bundle.
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.file_name())
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    layout_prefix: PathBuf,
    descriptor: Item,
    deployables: BTreeMap<String, Item>,
    synchronized: BTreeSet<String>,
    fail_on_error: bool,
}

impl Bundle {
    /// A descriptor-only bundle, as emitted by the local cache scanner.
    pub fn new(layout_prefix: impl Into<PathBuf>, descriptor: Item) -> Self {
        Self {
            layout_prefix: layout_prefix.into(),
            descriptor,
            deployables: BTreeMap::new(),
            synchronized: BTreeSet::new(),
            fail_on_error: false,
        }
    }

    pub fn layout_prefix(&self) -> &Path {
        &self.layout_prefix
    }

    pub fn descriptor(&self) -> &Item {
        &self.descriptor
    }

    pub fn coordinate(&self) -> &Coordinate {
        self.descriptor.coordinate()
    }

    pub fn deployables(&self) -> &BTreeMap<String, Item> {
        &self.deployables
    }

    pub fn synchronized(&self) -> &BTreeSet<String> {
        &self.synchronized
    }

    pub fn fail_on_error(&self) -> bool {
        self.fail_on_error
    }

    pub fn is_snapshot(&self) -> bool {
        self.coordinate().is_snapshot()
    }

    /// `<layout parent>/<version>.txt`: where this bundle's index entry lives
    /// inside an index directory.
    pub fn index_file_rel_path(&self) -> PathBuf {
        let mut file_name = self
            .layout_prefix
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".txt");
        match self.layout_prefix.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// `/`-separated archive entry name of this bundle's index entry.
    pub fn index_entry_name(&self) -> String {
        let segments: Vec<String> = self
            .layout_prefix
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("{}.txt", segments.join("/"))
    }

    /// Deployables in synchronization order: the descriptor first, then the
    /// remaining files by name.
    pub fn pending(&self) -> Vec<(&str, &Item)> {
        let descriptor_name = self.descriptor.file_name();
        let mut pending: Vec<(&str, &Item)> = self
            .deployables
            .iter()
            .map(|(name, item)| (name.as_str(), item))
            .collect();
        pending.sort_by_key(|(name, _)| *name != descriptor_name);
        pending
    }

    /// Expand a descriptor-only bundle into the concrete files on disk that
    /// belong to it.
    ///
    /// Siblings of the descriptor whose name starts with
    /// `<artifact>-<version>` followed by `-` or `.` are added, except partial
    /// downloads and names already synchronized. The descriptor itself is
    /// always added unless already present or synchronized.
    pub fn find_deployables(self) -> std::io::Result<Self> {
        let mut deployables = self.deployables.clone();
        let descriptor_name = self.descriptor.file_name();
        if !deployables.contains_key(&descriptor_name)
            && !self.synchronized.contains(&descriptor_name)
        {
            deployables.insert(descriptor_name.clone(), self.descriptor.clone());
        }

        let Some(dir) = self.descriptor.file.parent() else {
            return Ok(Self {
                deployables,
                ..self
            });
        };

        let coordinate = self.coordinate().clone();
        let prefix = coordinate.base_name();
        let mut names: Vec<String> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            if name == descriptor_name
                || name.ends_with(PARTIAL_DOWNLOAD_SUFFIX)
                || self.synchronized.contains(&name)
            {
                continue;
            }
            let Some(suffix) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some((kind, classifier)) = split_suffix(suffix) else {
                continue;
            };
            let key = ArtifactKey::new(coordinate.clone(), kind, classifier);
            let item = Item {
                key,
                file: dir.join(&name),
                metadata: self.descriptor.metadata.clone(),
            };
            deployables.insert(name, item);
        }

        Ok(Self {
            deployables,
            ..self
        })
    }

    /// Apply index contents: every listed name joins `synchronized` and leaves
    /// `deployables`.
    pub fn filtered_by_index<I, S>(self, indexed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deployables = self.deployables;
        let mut synchronized = self.synchronized;
        for name in indexed {
            let name = name.into();
            deployables.remove(&name);
            synchronized.insert(name);
        }
        Self {
            deployables,
            synchronized,
            ..self
        }
    }

    pub fn mark_fail_on_error(self, fail_on_error: bool) -> Self {
        Self {
            fail_on_error,
            ..self
        }
    }
}

/// Split the remainder after `<artifact>-<version>` into `(type, classifier)`.
///
/// `.jar` → `("jar", None)`; `-sources.jar` → `("jar", Some("sources"))`;
/// `.tar.gz` → `("tar.gz", None)`. Anything else is not part of the bundle.
fn split_suffix(suffix: &str) -> Option<(String, Option<String>)> {
    if let Some(kind) = suffix.strip_prefix('.') {
        return (!kind.is_empty()).then(|| (kind.to_owned(), None));
    }
    let rest = suffix.strip_prefix('-')?;
    let (classifier, kind) = rest.split_once('.')?;
    if kind.is_empty() {
        return None;
    }
    let classifier = (!classifier.is_empty()).then(|| classifier.to_owned());
    Some((kind.to_owned(), classifier))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::coordinate::DESCRIPTOR_TYPE;

    fn descriptor_bundle(root: &Path, c: &Coordinate, files: &[&str]) -> Bundle {
        let dir = root.join(c.layout_prefix());
        std::fs::create_dir_all(&dir).unwrap();
        for name in files {
            std::fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
        let key = ArtifactKey::new(c.clone(), DESCRIPTOR_TYPE, None);
        let descriptor = Item::new(key.clone(), dir.join(key.file_name()))
            .with_metadata(Metadata::VersionListing);
        Bundle::new(c.layout_prefix(), descriptor)
    }

    #[test]
    fn split_suffix_variants() {
        assert_eq!(split_suffix(".jar"), Some(("jar".into(), None)));
        assert_eq!(
            split_suffix("-sources.jar"),
            Some(("jar".into(), Some("sources".into())))
        );
        assert_eq!(split_suffix(".tar.gz"), Some(("tar.gz".into(), None)));
        assert_eq!(split_suffix("0.pom"), None);
        assert_eq!(split_suffix("-noext"), None);
        assert_eq!(split_suffix("."), None);
    }

    #[test]
    fn index_file_rel_path_appends_txt_to_version_dir() {
        let c = Coordinate::new("com.ex", "widget", "1");
        let tmp = TempDir::new().unwrap();
        let bundle = descriptor_bundle(tmp.path(), &c, &["widget-1.pom"]);
        assert_eq!(
            bundle.index_file_rel_path(),
            PathBuf::from("com/ex/widget/1.txt")
        );
        assert_eq!(bundle.index_entry_name(), "com/ex/widget/1.txt");
    }

    #[test]
    fn find_deployables_lists_matching_siblings() {
        let tmp = TempDir::new().unwrap();
        let c = Coordinate::new("com", "widget", "1");
        let bundle = descriptor_bundle(
            tmp.path(),
            &c,
            &[
                "widget-1.pom",
                "widget-1.jar",
                "widget-1-sources.jar",
                "widget-1.jar.lastUpdated",
                "widget-10.pom",
                "_remote.repositories",
            ],
        );

        let completed = bundle.find_deployables().unwrap();
        let names: Vec<&str> = completed.deployables().keys().map(String::as_str).collect();
        assert_eq!(names, ["widget-1-sources.jar", "widget-1.jar", "widget-1.pom"]);

        let sources = &completed.deployables()["widget-1-sources.jar"];
        assert_eq!(sources.key.kind, "jar");
        assert_eq!(sources.key.classifier.as_deref(), Some("sources"));
        assert_eq!(sources.metadata, vec![Metadata::VersionListing]);
    }

    #[test]
    fn find_deployables_skips_synchronized_names() {
        let tmp = TempDir::new().unwrap();
        let c = Coordinate::new("com", "widget", "1");
        let bundle = descriptor_bundle(tmp.path(), &c, &["widget-1.pom", "widget-1.jar"])
            .filtered_by_index(["widget-1.pom", "widget-1.jar"]);

        let completed = bundle.find_deployables().unwrap();
        assert!(completed.deployables().is_empty());
        assert_eq!(completed.synchronized().len(), 2);
    }

    #[test]
    fn filtered_by_index_keeps_sets_disjoint() {
        let tmp = TempDir::new().unwrap();
        let c = Coordinate::new("com", "widget", "1");
        let bundle = descriptor_bundle(tmp.path(), &c, &["widget-1.pom", "widget-1.jar"])
            .find_deployables()
            .unwrap()
            .filtered_by_index(["widget-1.jar", "widget-1-gone.zip"]);

        let deployables: BTreeSet<&String> = bundle.deployables().keys().collect();
        for name in bundle.synchronized() {
            assert!(!deployables.contains(name), "{name} in both sets");
        }
        assert_eq!(bundle.deployables().len(), 1);
        assert!(bundle.synchronized().contains("widget-1-gone.zip"));
    }

    #[test]
    fn pending_puts_descriptor_first() {
        let tmp = TempDir::new().unwrap();
        let c = Coordinate::new("com", "widget", "1");
        let bundle = descriptor_bundle(
            tmp.path(),
            &c,
            &["widget-1.pom", "widget-1.jar", "widget-1-a.jar"],
        )
        .find_deployables()
        .unwrap();
        let order: Vec<&str> = bundle.pending().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, ["widget-1.pom", "widget-1-a.jar", "widget-1.jar"]);
    }

    #[test]
    fn mark_fail_on_error_preserves_contents() {
        let tmp = TempDir::new().unwrap();
        let c = Coordinate::new("com", "widget", "1");
        let bundle = descriptor_bundle(tmp.path(), &c, &["widget-1.pom"])
            .find_deployables()
            .unwrap();
        let marked = bundle.clone().mark_fail_on_error(true);
        assert!(marked.fail_on_error());
        assert_eq!(marked.deployables(), bundle.deployables());
        assert!(!marked.mark_fail_on_error(false).fail_on_error());
    }
}
