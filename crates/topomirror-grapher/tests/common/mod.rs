//! Common test utilities for grapher integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use topomirror_core::{Link, MirrorGraph, Node};
use topomirror_grapher::Grapher;
use topomirror_store::{Entity, MemoryStore, TopologyStore};

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give the apply loop time to drain whatever is queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// A live grapher over a fresh in-memory store.
pub async fn live_grapher() -> (Arc<MemoryStore>, Grapher) {
    let store = Arc::new(MemoryStore::new());
    let grapher = Grapher::live(store.clone()).await.unwrap();
    (store, grapher)
}

/// Write an entity to the store as another client would.
pub async fn remote_write(store: &MemoryStore, entity: impl Into<Entity>) {
    store.insert(entity.into(), true).await.unwrap();
}

pub fn node(id: &str, ports: &[&str]) -> Node {
    ports
        .iter()
        .fold(Node::with_id(id, id), |n, p| n.with_port(*p))
}

pub fn undirected(id: &str, a: &str, b: &str) -> Link {
    Link::undirected(a, b).with_id(id)
}

/// Edges as sorted (tail name, head name, link, properties) tuples.
pub fn edge_summary(graph: &MirrorGraph) -> Vec<(String, String, String, String)> {
    let mut edges: Vec<_> = graph
        .edges()
        .map(|(from, to, data)| {
            (
                from.name.clone(),
                to.name.clone(),
                data.link.to_string(),
                serde_json::Value::Object(data.properties.clone()).to_string(),
            )
        })
        .collect();
    edges.sort();
    edges
}
