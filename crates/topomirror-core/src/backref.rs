//! Backreference table.
//!
//! Records, per port, the node that currently owns it and the link routed
//! through it. Ports carry no pointer to their node; ownership is looked up
//! here. A missing entry means "unknown", never an error.

use dashmap::DashMap;
use tracing::trace;

use crate::model::{LinkId, NodeId, PortId};

/// Per-port state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRef {
    /// Node listing this port, if one has been observed
    pub owner: Option<NodeId>,

    /// Link routed through this port. It stays recorded after the link is
    /// materialized so that a later node update can re-resolve it.
    pub pending: Option<LinkId>,
}

impl PortRef {
    fn is_empty(&self) -> bool {
        self.owner.is_none() && self.pending.is_none()
    }
}

/// Concurrent map from port to [`PortRef`].
///
/// Uses interior mutability via DashMap; all methods take `&self`.
/// Entries are created lazily on the first bind or pending registration.
#[derive(Debug, Default)]
pub struct BackrefTable {
    entries: DashMap<PortId, PortRef>,
}

impl BackrefTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `node` as owner of `port`.
    ///
    /// Returns the link routed through the port, which may now be resolvable.
    pub fn bind(&self, port: &PortId, node: &NodeId) -> Option<LinkId> {
        let mut entry = self.entries.entry(port.clone()).or_default();
        if entry.owner.as_ref() != Some(node) {
            trace!(port = %port, node = %node, "binding port owner");
            entry.owner = Some(node.clone());
        }
        entry.pending.clone()
    }

    /// Record that `link` is routed through `port`.
    ///
    /// Returns the current owner of the port if known. A port carries at most
    /// one link: a later registration replaces the earlier one.
    pub fn set_pending(&self, port: &PortId, link: &LinkId) -> Option<NodeId> {
        let mut entry = self.entries.entry(port.clone()).or_default();
        if let Some(previous) = entry.pending.as_ref().filter(|p| *p != link) {
            trace!(port = %port, previous = %previous, link = %link, "replacing port link");
        }
        entry.pending = Some(link.clone());
        entry.owner.clone()
    }

    /// Forget `link` on `port` if it is the link recorded there.
    pub fn release(&self, port: &PortId, link: &LinkId) {
        self.entries.remove_if_mut(port, |_, entry| {
            if entry.pending.as_ref() == Some(link) {
                entry.pending = None;
            }
            entry.is_empty()
        });
    }

    /// Drop all state for `port`, returning what was there.
    pub fn clear(&self, port: &PortId) -> Option<PortRef> {
        self.entries.remove(port).map(|(_, entry)| entry)
    }

    /// Current owner of a port
    pub fn owner(&self, port: &PortId) -> Option<NodeId> {
        self.entries.get(port).and_then(|e| e.owner.clone())
    }

    /// Link recorded on a port
    pub fn pending(&self, port: &PortId) -> Option<LinkId> {
        self.entries.get(port).and_then(|e| e.pending.clone())
    }

    /// Snapshot of the entry for a port
    pub fn get(&self, port: &PortId) -> Option<PortRef> {
        self.entries.get(port).map(|e| e.clone())
    }

    /// Number of ports with any recorded state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
