//! Topology snapshot files.
//!
//! A snapshot is a plain JSON document holding every entity of the three
//! collections:
//!
//! ```json
//! {
//!   "nodes": [{"id": "n1", "name": "sw1", "ports": ["p1"]}],
//!   "ports": [{"id": "p1"}],
//!   "links": [{"id": "l1", "endpoints": ["p1", "p2"]}]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use topomirror_core::{Link, Node, Port};

use crate::error::StoreError;
use crate::types::Entity;

/// Every entity of a topology, grouped by collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl TopologySnapshot {
    /// Read a snapshot file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::snapshot_not_found(path));
        }
        let content = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            ports = snapshot.ports.len(),
            links = snapshot.links.len(),
            "loaded topology snapshot"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!(path = %path.display(), "saved topology snapshot");
        Ok(())
    }

    /// Add an entity to its collection.
    pub fn push(&mut self, entity: Entity) {
        match entity {
            Entity::Node(node) => self.nodes.push(node),
            Entity::Port(port) => self.ports.push(port),
            Entity::Link(link) => self.links.push(link),
        }
    }

    /// All entities, nodes first, then ports, then links
    pub fn into_entities(self) -> impl Iterator<Item = Entity> {
        self.nodes
            .into_iter()
            .map(Entity::Node)
            .chain(self.ports.into_iter().map(Entity::Port))
            .chain(self.links.into_iter().map(Entity::Link))
    }

    /// Total number of entities
    pub fn len(&self) -> usize {
        self.nodes.len() + self.ports.len() + self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = TopologySnapshot::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::SnapshotNotFound { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nodes: ").unwrap();
        assert!(matches!(
            TopologySnapshot::load(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodes-only.json");
        fs::write(&path, r#"{"nodes": [{"id": "n1", "name": "a"}]}"#).unwrap();

        let snapshot = TopologySnapshot::load(&path).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.links.is_empty());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("topology.json");

        let mut snapshot = TopologySnapshot::default();
        snapshot.push(Entity::Node(Node::with_id("n1", "a").with_port("p1")));
        snapshot.push(Entity::Link(Link::undirected("p1", "p2").with_id("l1")));
        snapshot.save(&path).unwrap();

        let loaded = TopologySnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        let kinds: Vec<_> = loaded.into_entities().map(|e| e.collection()).collect();
        assert_eq!(kinds.len(), 2);
    }
}
