//! Directory-backed store.
//!
//! The store root uses the same `<group>/<artifact>/<version>/` layout as the
//! local cache. Every deployed file gets a `.sha256` sidecar and is copied
//! through a uniquely named temporary sibling so readers never observe a
//! partial file. Version listings are read-modify-write, so updates to them
//! are serialized per store.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use stockpile_core::{ArtifactKey, Item};

use crate::error::{store_io_err, StoreError};
use crate::store::{checksum_hex, listing_updates, RemoteStore, VersionListing, CHECKSUM_EXTENSION};

#[derive(Debug, Clone)]
pub struct FileStore {
    id: String,
    root: PathBuf,
    listing_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            listing_lock: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `key` inside the store.
    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.root
            .join(key.coordinate.layout_prefix())
            .join(key.file_name())
    }

    fn listing_path(&self, group: &str, artifact: &str) -> PathBuf {
        self.root.join(VersionListing::remote_path(group, artifact))
    }

    fn read_listing(&self, group: &str, artifact: &str) -> Result<Option<VersionListing>, StoreError> {
        let path = self.listing_path(group, artifact);
        match std::fs::read_to_string(&path) {
            Ok(xml) => Ok(Some(VersionListing::parse(&xml))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_io_err(path, e)),
        }
    }

    fn update_listing(&self, group: &str, artifact: &str, version: &str, snapshot: bool) -> Result<(), StoreError> {
        let mut listing = self
            .read_listing(group, artifact)?
            .unwrap_or_else(|| VersionListing::new(group, artifact));
        listing.add_version(version, snapshot, Utc::now());
        write_atomic(&self.listing_path(group, artifact), listing.to_xml().as_bytes())
    }
}

impl RemoteStore for FileStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn deploy(&self, items: &[Item]) -> Result<(), StoreError> {
        for item in items {
            let dest = self.path_of(&item.key);
            let contents = std::fs::read(&item.file).map_err(|e| store_io_err(&item.file, e))?;
            write_atomic(&dest, &contents)?;
            let checksum = checksum_hex(&dest)?;
            let sidecar = sidecar_path(&dest);
            write_atomic(&sidecar, checksum.as_bytes())?;
            tracing::debug!(store = %self.id, key = %item.key, "deployed");
        }
        let _guard = self.listing_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for (group, artifact, version) in listing_updates(items) {
            let snapshot = items
                .iter()
                .find(|i| i.coordinate().version() == version)
                .map(|i| i.coordinate().is_snapshot())
                .unwrap_or(false);
            self.update_listing(group, artifact, version, snapshot)?;
        }
        Ok(())
    }

    fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        let path = self.path_of(key);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::NotFound {
                store: self.id.clone(),
                key: key.to_string(),
            })
        }
    }

    fn latest_version(&self, group: &str, artifact: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .read_listing(group, artifact)?
            .and_then(|listing| listing.latest_version().map(str::to_owned)))
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

/// Write `contents` to a fresh temporary file next to `path`, then rename it
/// over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| store_io_err(parent, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| store_io_err(parent, e))?;
    tmp.write_all(contents).map_err(|e| store_io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| store_io_err(path, e.error))?;
    Ok(())
}
