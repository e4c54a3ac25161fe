//! Remote artifact stores.
//!
//! The engine talks to a store only through [`RemoteStore`]: deploy a set of
//! items, resolve one artifact, and look up the latest version of an
//! artifact. [`FileStore`] and [`HttpStore`] are the concrete stores;
//! [`StoreTarget`] turns an `id::url` descriptor into one of them.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use stockpile_core::{ArtifactKey, Item};

use crate::error::{store_io_err, StoreError};

pub mod file;
pub mod http;
pub mod metadata;
pub mod target;

pub use file::FileStore;
pub use http::HttpStore;
pub use metadata::VersionListing;
pub use target::StoreTarget;

/// Extension of the checksum sidecar written next to every deployed file.
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// A remote artifact store. Implementations must be safe to call from several
/// synchronization workers at once.
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Repository id, for log messages and errors.
    fn id(&self) -> &str;

    /// Upload `items` and update version listings for items that carry
    /// [`stockpile_core::Metadata::VersionListing`].
    fn deploy(&self, items: &[Item]) -> Result<(), StoreError>;

    /// Locate `key` in the store and return a local path to its contents.
    ///
    /// Returns [`StoreError::NotFound`] when the artifact is absent.
    fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError>;

    /// Latest version recorded in the artifact's version listing, if any.
    fn latest_version(&self, group: &str, artifact: &str) -> Result<Option<String>, StoreError>;
}

/// Hex-encoded SHA-256 of a file's contents.
pub(crate) fn checksum_hex(path: &Path) -> Result<String, StoreError> {
    let mut file = File::open(path).map_err(|e| store_io_err(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| store_io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Distinct `(group, artifact, version)` triples among `items` that request a
/// version listing update, in first-seen order.
pub(crate) fn listing_updates(items: &[Item]) -> Vec<(&str, &str, &str)> {
    let mut updates: Vec<(&str, &str, &str)> = Vec::new();
    for item in items {
        if !item
            .metadata
            .contains(&stockpile_core::Metadata::VersionListing)
        {
            continue;
        }
        let c = item.coordinate();
        let triple = (c.group(), c.artifact(), c.version());
        if !updates.contains(&triple) {
            updates.push(triple);
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::{Coordinate, Metadata};
    use tempfile::TempDir;

    #[test]
    fn checksum_matches_known_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            checksum_hex(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn listing_updates_are_deduplicated() {
        let c = Coordinate::new("com", "widget", "1");
        let pom = Item::new(ArtifactKey::new(c.clone(), "pom", None), "widget-1.pom")
            .with_metadata(Metadata::VersionListing);
        let jar = Item::new(ArtifactKey::new(c.clone(), "jar", None), "widget-1.jar")
            .with_metadata(Metadata::VersionListing);
        let bare = Item::new(ArtifactKey::new(c, "zip", None), "widget-1.zip");
        let items = [pom, jar, bare];
        assert_eq!(listing_updates(&items), vec![("com", "widget", "1")]);
    }
}
