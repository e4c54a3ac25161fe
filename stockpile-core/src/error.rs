//! Error types for stockpile-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from core value parsing and settings loading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on a settings file, with file path and line context.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A coordinate string did not have the expected `a:b[:c]` shape.
    #[error("invalid coordinate '{value}'; expected {expected}")]
    InvalidCoordinate {
        value: String,
        expected: &'static str,
    },

    /// A required setting was not supplied by the file or the command line.
    #[error("missing required setting '{0}'")]
    MissingSetting(&'static str),

    /// `dirs::home_dir()` returned `None`, so the default local cache cannot be located.
    #[error("cannot determine home directory; set $HOME or pass --local-repository")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
