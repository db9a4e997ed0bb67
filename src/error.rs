use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Failure to localize one asset. Cloned into every page that shares the asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

/// Errors that end a whole mirroring job.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("output directory must not be empty")]
    EmptyOutputDir,

    #[error("failed to fetch {url}: {source}")]
    PageFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[source] std::io::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("mirroring did not finish within {0:?}")]
    Timeout(Duration),
}

impl MirrorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}
