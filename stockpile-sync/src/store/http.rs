//! HTTP store speaking the plain PUT/GET repository layout.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;

use stockpile_core::{ArtifactKey, Item};

use crate::error::{store_io_err, StoreError};
use crate::store::{checksum_hex, listing_updates, RemoteStore, VersionListing, CHECKSUM_EXTENSION};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpStore {
    id: String,
    base_url: String,
    agent: ureq::Agent,
    download_dir: PathBuf,
    /// Serializes the GET-modify-PUT of version listings across workers.
    listing_lock: Arc<Mutex<()>>,
}

impl HttpStore {
    /// `download_dir` receives resolved artifacts, laid out like the store.
    pub fn new(id: impl Into<String>, base_url: &str, download_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Self {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent,
            download_dir: download_dir.into(),
            listing_lock: Arc::default(),
        }
    }

    fn url(&self, remote_path: &str) -> String {
        format!("{}/{}", self.base_url, remote_path)
    }

    fn put_file(&self, url: &str, file: &std::path::Path) -> Result<(), StoreError> {
        let body = File::open(file).map_err(|e| store_io_err(file, e))?;
        self.agent
            .put(url)
            .send(BufReader::new(body))
            .map(drop)
            .map_err(|e| request_error("PUT", url, e))
    }

    fn put_text(&self, url: &str, body: &str) -> Result<(), StoreError> {
        self.agent
            .put(url)
            .send_string(body)
            .map(drop)
            .map_err(|e| request_error("PUT", url, e))
    }

    /// GET `url`; `Ok(None)` on 404.
    fn get(&self, url: &str) -> Result<Option<ureq::Response>, StoreError> {
        match self.agent.get(url).call() {
            Ok(response) => Ok(Some(response)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(request_error("GET", url, e)),
        }
    }

    fn read_listing(&self, group: &str, artifact: &str) -> Result<Option<VersionListing>, StoreError> {
        let url = self.url(&VersionListing::remote_path(group, artifact));
        let Some(response) = self.get(&url)? else {
            return Ok(None);
        };
        let xml = response.into_string().map_err(|e| StoreError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(VersionListing::parse(&xml)))
    }
}

impl RemoteStore for HttpStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn deploy(&self, items: &[Item]) -> Result<(), StoreError> {
        for item in items {
            let url = self.url(&item.key.remote_path());
            self.put_file(&url, &item.file)?;
            let checksum = checksum_hex(&item.file)?;
            self.put_text(&format!("{url}.{CHECKSUM_EXTENSION}"), &checksum)?;
            tracing::debug!(store = %self.id, %url, "deployed");
        }
        let _guard = self.listing_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for (group, artifact, version) in listing_updates(items) {
            let snapshot = items
                .iter()
                .find(|i| i.coordinate().version() == version)
                .map(|i| i.coordinate().is_snapshot())
                .unwrap_or(false);
            let mut listing = self
                .read_listing(group, artifact)?
                .unwrap_or_else(|| VersionListing::new(group, artifact));
            listing.add_version(version, snapshot, Utc::now());
            let url = self.url(&VersionListing::remote_path(group, artifact));
            self.put_text(&url, &listing.to_xml())?;
        }
        Ok(())
    }

    fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        let remote_path = key.remote_path();
        let url = self.url(&remote_path);
        let Some(response) = self.get(&url)? else {
            return Err(StoreError::NotFound {
                store: self.id.clone(),
                key: key.to_string(),
            });
        };

        let dest = self.download_dir.join(&remote_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| store_io_err(parent, e))?;
        }
        let mut tmp = dest.as_os_str().to_os_string();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        let mut out = File::create(&tmp).map_err(|e| store_io_err(&tmp, e))?;
        if let Err(e) = std::io::copy(&mut response.into_reader(), &mut out) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Transport {
                url,
                message: e.to_string(),
            });
        }
        drop(out);
        std::fs::rename(&tmp, &dest).map_err(|e| store_io_err(&dest, e))?;
        Ok(dest)
    }

    fn latest_version(&self, group: &str, artifact: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .read_listing(group, artifact)?
            .and_then(|listing| listing.latest_version().map(str::to_owned)))
    }
}

fn request_error(method: &'static str, url: &str, error: ureq::Error) -> StoreError {
    match error {
        ureq::Error::Status(status, _) => StoreError::Status {
            method,
            url: url.to_owned(),
            status,
        },
        ureq::Error::Transport(transport) => StoreError::Transport {
            url: url.to_owned(),
            message: transport.to_string(),
        },
    }
}
