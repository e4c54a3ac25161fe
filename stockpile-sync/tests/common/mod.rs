//! Shared fixtures for stockpile-sync integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use stockpile_core::{ArtifactKey, IndexCoordinate, Item, Metadata, Settings};
use stockpile_sync::archive;
use stockpile_sync::index::INDEX_ARCHIVE_TYPE;
use stockpile_sync::{Context, FileStore, RemoteStore, StoreError};
use tempfile::TempDir;

pub const INDEX: &str = "com.ci:index";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A [`FileStore`] with scripted failures and a call log.
#[derive(Debug)]
pub struct ScriptedStore {
    inner: FileStore,
    /// Artifact names whose multi-item deploys fail.
    bulk_fail: HashSet<String>,
    /// File names whose deploys always fail.
    reject: HashSet<String>,
    /// File names that resolve even if never deployed.
    present: HashSet<String>,
    log: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: FileStore::new("scripted", root),
            bulk_fail: HashSet::new(),
            reject: HashSet::new(),
            present: HashSet::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_bulk(mut self, artifact: &str) -> Self {
        self.bulk_fail.insert(artifact.to_owned());
        self
    }

    pub fn rejecting(mut self, file: &str) -> Self {
        self.reject.insert(file.to_owned());
        self
    }

    pub fn with_present(mut self, file: &str) -> Self {
        self.present.insert(file.to_owned());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn deploys(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|line| line.starts_with("deploy "))
            .collect()
    }

    fn refuse(&self, items: &[Item]) -> StoreError {
        StoreError::Status {
            method: "PUT",
            url: items.iter().map(Item::file_name).collect::<Vec<_>>().join(","),
            status: 500,
        }
    }
}

impl RemoteStore for ScriptedStore {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn deploy(&self, items: &[Item]) -> Result<(), StoreError> {
        let names: Vec<String> = items.iter().map(Item::file_name).collect();
        self.log.lock().unwrap().push(format!("deploy {}", names.join(",")));
        let bulk_refused = items.len() > 1
            && items
                .iter()
                .any(|i| self.bulk_fail.contains(i.coordinate().artifact()));
        if bulk_refused || names.iter().any(|n| self.reject.contains(n)) {
            return Err(self.refuse(items));
        }
        self.inner.deploy(items)
    }

    fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        self.log.lock().unwrap().push(format!("resolve {}", key.file_name()));
        if self.present.contains(&key.file_name()) {
            return Ok(self.inner.path_of(key));
        }
        self.inner.resolve(key)
    }

    fn latest_version(&self, group: &str, artifact: &str) -> Result<Option<String>, StoreError> {
        self.inner.latest_version(group, artifact)
    }
}

/// Local cache, remote store root, and scratch space for one test.
pub struct Workspace {
    pub cache: TempDir,
    pub remote: TempDir,
    pub scratch: TempDir,
}

impl Workspace {
    pub fn new(files: &[&str]) -> Self {
        let ws = Self {
            cache: TempDir::new().unwrap(),
            remote: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        };
        for rel in files {
            ws.add(rel);
        }
        ws
    }

    pub fn add(&self, rel: &str) {
        let path = self.cache.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    pub fn settings(&self) -> Settings {
        Settings {
            local_repository: Some(self.cache.path().to_path_buf()),
            index: Some(INDEX.parse().unwrap()),
            jobs: 2,
            ..Settings::default()
        }
    }

    /// A context over `store` with its own run directory under `scratch`.
    pub fn context(&self, store: Arc<dyn RemoteStore>, snapshots: bool, run: &str) -> Arc<Context> {
        let dir = self.scratch.path().join(run);
        std::fs::create_dir_all(&dir).unwrap();
        let snapshot = snapshots.then(|| Arc::clone(&store));
        Arc::new(Context::new(store, snapshot, dir))
    }

    /// Publish an index containing `entries` as `version`, as a previous run
    /// would have.
    pub fn publish_index(&self, version: &str, entries: &[(&str, &str)]) {
        let dir = self.scratch.path().join("prior");
        for (name, body) in entries {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        let archive_path = self.scratch.path().join("prior.tar.gz");
        archive::pack_dir(&dir, &archive_path).unwrap();
        let descriptor = self.scratch.path().join("prior.pom");
        std::fs::write(&descriptor, "<project/>").unwrap();

        let coordinate = INDEX.parse::<IndexCoordinate>().unwrap().at_version(version);
        let store = FileStore::new("seed", self.remote.path());
        store
            .deploy(&[
                Item::new(ArtifactKey::new(coordinate.clone(), "pom", None), descriptor)
                    .with_metadata(Metadata::VersionListing),
                Item::new(ArtifactKey::new(coordinate, INDEX_ARCHIVE_TYPE, None), archive_path)
                    .with_metadata(Metadata::VersionListing),
            ])
            .unwrap();
    }

    /// Entries of the index archive published as `version`.
    pub fn published_entry(&self, version: &str, entry: &str) -> Option<Vec<String>> {
        let archive = self
            .remote
            .path()
            .join(format!("com/ci/index/{version}/index-{version}.tar.gz"));
        let entries = archive::read_entries(&archive).unwrap();
        entries.get(entry).map(|raw| {
            let mut names: Vec<String> = String::from_utf8(raw.clone())
                .unwrap()
                .lines()
                .map(str::to_owned)
                .collect();
            names.sort();
            names
        })
    }

    pub fn latest_index_version(&self) -> Option<String> {
        FileStore::new("probe", self.remote.path())
            .latest_version("com.ci", "index")
            .unwrap()
    }
}
