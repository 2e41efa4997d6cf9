//! Mirror error types.

use thiserror::Error;

use crate::model::{LinkId, NodeId};

/// Errors raised by the mirror graph and the event adapter.
///
/// Pending links are never reported through this type: a link whose endpoint
/// owners are unknown simply waits in the backreference table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The operation needs both endpoint owners of the link, and one is unknown
    #[error("incomplete link '{link}': endpoint owner is not known")]
    IncompleteLink { link: LinkId },

    /// A structural change was attempted outside the sanctioned write path
    #[error("operation '{operation}' prohibited: structural changes are only allowed through the grapher outside a read window")]
    OperationProhibited { operation: &'static str },

    /// Node not present in the mirror
    #[error("node '{id}' not found in mirror")]
    NodeNotFound { id: String },

    /// Link never observed by the adapter
    #[error("link '{id}' not found")]
    LinkNotFound { id: LinkId },

    /// Link exists but does not join the two given nodes
    #[error("link '{link}' does not connect '{a}' and '{b}'")]
    LinkNotBetween { link: LinkId, a: NodeId, b: NodeId },
}

impl GraphError {
    /// Create an IncompleteLink error.
    pub fn incomplete_link(link: impl Into<LinkId>) -> Self {
        Self::IncompleteLink { link: link.into() }
    }

    /// Create an OperationProhibited error.
    pub fn prohibited(operation: &'static str) -> Self {
        Self::OperationProhibited { operation }
    }

    /// Create a NodeNotFound error.
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a LinkNotFound error.
    pub fn link_not_found(id: impl Into<LinkId>) -> Self {
        Self::LinkNotFound { id: id.into() }
    }
}
