//! `id::url` store descriptors.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SyncError;
use crate::store::{FileStore, HttpStore, RemoteStore};

/// A parsed `id::url` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub id: String,
    pub url: String,
}

impl FromStr for StoreTarget {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            SyncError::Configuration(format!(
                "invalid repository '{s}': {why}; use \"id::url\""
            ))
        };
        let (id, url) = s.trim().split_once("::").ok_or_else(|| invalid("missing '::'"))?;
        let (id, url) = (id.trim(), url.trim());
        if id.is_empty() {
            return Err(invalid("empty id"));
        }
        if url.is_empty() {
            return Err(invalid("empty url"));
        }
        Ok(Self {
            id: id.to_owned(),
            url: url.to_owned(),
        })
    }
}

impl StoreTarget {
    /// Open the store this descriptor points at.
    ///
    /// `http(s)://` URLs open an [`HttpStore`] whose downloads land under
    /// `download_dir`; `file://` URLs and bare paths open a [`FileStore`].
    pub fn open(&self, download_dir: &Path) -> Result<Arc<dyn RemoteStore>, SyncError> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            let dir = download_dir.join(&self.id);
            return Ok(Arc::new(HttpStore::new(&self.id, &self.url, dir)));
        }
        if let Some(path) = self.url.strip_prefix("file://") {
            return Ok(Arc::new(FileStore::new(&self.id, PathBuf::from(path))));
        }
        if self.url.contains("://") {
            return Err(SyncError::Configuration(format!(
                "unsupported repository url '{}' for '{}'",
                self.url, self.id
            )));
        }
        Ok(Arc::new(FileStore::new(&self.id, PathBuf::from(&self.url))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_and_url() {
        let target: StoreTarget = " releases :: https://repo.example.com/releases "
            .parse()
            .unwrap();
        assert_eq!(target.id, "releases");
        assert_eq!(target.url, "https://repo.example.com/releases");
    }

    #[test]
    fn url_may_contain_double_colons() {
        let target: StoreTarget = "local::http://[::1]:8081/repo".parse().unwrap();
        assert_eq!(target.id, "local");
        assert_eq!(target.url, "http://[::1]:8081/repo");
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for raw in ["no-separator", "::file:///x", "id::", "  "] {
            let err = raw.parse::<StoreTarget>().unwrap_err();
            assert!(matches!(err, SyncError::Configuration(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn opens_store_by_scheme() {
        let dir = tempfile::TempDir::new().unwrap();
        let file: StoreTarget = "a::file:///srv/repo".parse().unwrap();
        let bare: StoreTarget = "b::/srv/repo".parse().unwrap();
        let http: StoreTarget = "c::https://repo.example.com".parse().unwrap();
        let ftp: StoreTarget = "d::ftp://repo.example.com".parse().unwrap();
        assert_eq!(file.open(dir.path()).unwrap().id(), "a");
        assert_eq!(bare.open(dir.path()).unwrap().id(), "b");
        assert_eq!(http.open(dir.path()).unwrap().id(), "c");
        assert!(ftp.open(dir.path()).is_err());
    }
}
