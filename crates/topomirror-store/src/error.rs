//! Store error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Collection;

/// Errors that can occur talking to a topology store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entity not present in the collection
    #[error("{collection} entity '{id}' not found")]
    NotFound { collection: Collection, id: String },

    /// Store cannot be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file could not be read
    #[error("topology snapshot not found at '{path}'")]
    SnapshotNotFound { path: PathBuf },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a NotFound error.
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Create an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a SnapshotNotFound error.
    pub fn snapshot_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SnapshotNotFound { path: path.into() }
    }
}
