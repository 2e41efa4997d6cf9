//! Grapher error types.

use thiserror::Error;
use topomirror_core::GraphError;
use topomirror_store::StoreError;

/// Errors returned by the public graph API.
#[derive(Error, Debug)]
pub enum GrapherError {
    /// Mirror-side failure (unknown node, incomplete link, prohibited operation)
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The store rejected or could not complete the remote write
    #[error("store propagation failed: {0}")]
    Store(#[from] StoreError),
}

impl GrapherError {
    /// Check whether this is a refused structural change
    pub fn is_prohibited(&self) -> bool {
        matches!(self, Self::Graph(GraphError::OperationProhibited { .. }))
    }
}
