//! Error taxonomy for the content cache.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by record and catalog operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Source file vanished or could not be read mid-operation
    #[error("Source unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sidecar exists but does not deserialize
    #[error("Sidecar corrupt: {path}: {source}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Sidecar with no matching source file
    #[error("Orphaned sidecar: {0}")]
    OrphanSidecar(PathBuf),

    /// Delete event for a source that never had a sidecar
    #[error("No sidecar to delete for source: {0}")]
    MissingSidecarOnDelete(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
