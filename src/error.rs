//! Error types for corpus loading and result export.
//!
//! The inference algorithms never fail: bad units are logged and skipped.
//! Only the I/O boundary returns these errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZoneOrderError {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("route {0} has no sequence record")]
    MissingSequence(String),
}

impl ZoneOrderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ZoneOrderError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ZoneOrderError::Json { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ZoneOrderError>;
