//! Error types for stockpile-sync.

use std::path::PathBuf;

use thiserror::Error;

use stockpile_core::{Coordinate, CoreError};

/// Failures reported by a remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested artifact does not exist in the store.
    #[error("{key} not found in repository '{store}'")]
    NotFound { store: String, key: String },

    /// Local I/O failure while reading an upload or writing a download.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store answered with an unexpected HTTP status.
    #[error("HTTP {status} for {method} {url}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

/// Why a deploy call did not succeed.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Routing selected the snapshot target but none is configured.
    #[error("no snapshot repository configured for {0}")]
    NoSnapshotTarget(Coordinate),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A per-bundle index entry that cannot be read. Never fatal: the entry is
/// treated as absent.
#[derive(Debug, Error)]
pub enum IndexParseError {
    #[error("index entry {entry} is not valid UTF-8")]
    Encoding { entry: String },

    #[error("index entry {entry} lists '{line}', which is not a bare file name")]
    InvalidName { entry: String, line: String },
}

/// A bundle whose bulk deploy and per-item fallback were both exhausted.
#[derive(Debug, Error)]
#[error("failed to synchronize {file} of {coordinate}: {cause}")]
pub struct SyncFailure {
    pub coordinate: Coordinate,
    /// File name of the item the failure is attributed to.
    pub file: String,
    #[source]
    pub cause: DeployError,
}

/// All errors that end a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Settings could not be loaded or interpreted.
    #[error("settings error: {0}")]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local cache could not be walked.
    #[error("failed to scan local cache at {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Invalid store targets or a snapshot with nowhere to go.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A store call made outside per-bundle synchronization failed.
    #[error("repository error: {0}")]
    Store(#[from] StoreError),

    /// A bundle produced by the current build could not be synchronized.
    #[error("required bundle {coordinate} failed to synchronize")]
    RequiredBundle {
        coordinate: Coordinate,
        #[source]
        source: SyncFailure,
    },

    /// The configured failure threshold was reached; the index was not published.
    #[error("terminated after {count} failed bundles (threshold {threshold}); index not published")]
    FailureThreshold { count: u64, threshold: u64 },

    /// The run finished with failures and failures are not ignored.
    #[error("{count} bundle(s) failed to synchronize")]
    Failures { count: u64 },

    /// The rebuilt index could not be uploaded.
    #[error("failed to publish index {coordinate}: {source}")]
    Publish {
        coordinate: Coordinate,
        #[source]
        source: DeployError,
    },

    /// A synchronization worker panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn store_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
