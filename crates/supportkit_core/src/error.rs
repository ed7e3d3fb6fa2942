use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupportError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed event log: {0}")]
    MalformedXml(String),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("resource usage unavailable: {0}")]
    ResourceUnavailable(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SupportError {
    /// Maps a read failure to `NotFound` when the file is absent.
    pub fn from_read(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            SupportError::NotFound(path.to_path_buf())
        } else {
            SupportError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T, E = SupportError> = std::result::Result<T, E>;
