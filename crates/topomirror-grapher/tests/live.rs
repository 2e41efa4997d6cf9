//! Live-mode behaviour: store notifications in, store writes out.

mod common;

use async_trait::async_trait;
use common::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use topomirror_core::{GraphError, Link, LinkId, NodeId, PortId, Properties};
use topomirror_grapher::{Grapher, GrapherError, GraphMode};
use topomirror_store::{Collection, Entity, MemoryStore, StoreError, StoreEvent, TopologyStore};

/// Store in which another client gives node `a` a new port while the first
/// port write of this client is on its way.
struct InterleavedStore {
    inner: Arc<MemoryStore>,
    interleaved: AtomicBool,
}

impl InterleavedStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            interleaved: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TopologyStore for InterleavedStore {
    async fn load(&self, collection: Collection) -> Result<Vec<Entity>, StoreError> {
        self.inner.load(collection).await
    }

    async fn insert(&self, entity: Entity, commit: bool) -> Result<Entity, StoreError> {
        if matches!(entity, Entity::Port(_)) && !self.interleaved.swap(true, Ordering::SeqCst) {
            remote_write(&self.inner, node("a", &["px"])).await;
        }
        self.inner.insert(entity, commit).await
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.inner.remove(collection, id).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        self.inner.subscribe()
    }
}

// ============================================================================
// Notifications From Other Clients
// ============================================================================

#[tokio::test]
async fn test_link_before_nodes_resolves_when_both_arrive() {
    let (store, grapher) = live_grapher().await;

    remote_write(&store, undirected("l1", "pa", "pb")).await;
    remote_write(&store, node("a", &["pa"])).await;
    settle().await;
    assert_eq!(grapher.stats().edges, 0);
    assert_eq!(grapher.pending_links(), vec![LinkId::new("l1")]);

    remote_write(&store, node("b", &["pb"])).await;
    eventually("link materialized", || grapher.stats().edges == 2).await;
    assert!(grapher.check_invariants().is_empty());
}

#[tokio::test]
async fn test_each_arrival_order_gives_same_mirror() {
    let orders: [[usize; 3]; 3] = [[0, 1, 2], [2, 0, 1], [0, 2, 1]];
    let mut summaries = Vec::new();

    for order in orders {
        let (store, grapher) = live_grapher().await;
        let entities: [Entity; 3] = [
            node("a", &["pa"]).into(),
            node("b", &["pb"]).into(),
            Link::directed("pa", "pb").with_id("l1").into(),
        ];
        for i in order {
            remote_write(&store, entities[i].clone()).await;
        }
        eventually("link materialized", || grapher.stats().links == 1).await;
        summaries.push(grapher.with_graph(edge_summary));
    }

    assert_eq!(summaries[0].len(), 1);
    assert_eq!(summaries[0], summaries[1]);
    assert_eq!(summaries[1], summaries[2]);
}

#[tokio::test]
async fn test_link_flips_between_directed_and_undirected() {
    let (store, grapher) = live_grapher().await;
    remote_write(&store, node("a", &["pa"])).await;
    remote_write(&store, node("b", &["pb"])).await;

    remote_write(&store, Link::directed("pa", "pb").with_id("l1")).await;
    eventually("directed edge", || grapher.stats().edges == 1).await;

    remote_write(&store, undirected("l1", "pa", "pb")).await;
    eventually("undirected pair", || grapher.stats().edges == 2).await;

    remote_write(&store, Link::directed("pb", "pa").with_id("l1")).await;
    eventually("reversed directed edge", || grapher.stats().edges == 1).await;

    let (a, b) = (NodeId::new("a"), NodeId::new("b"));
    grapher.with_graph(|g| {
        assert!(g.edges_between(&a, &b).is_empty());
        assert_eq!(g.edges_between(&b, &a).len(), 1);
    });
    assert!(grapher.check_invariants().is_empty());
}

#[tokio::test]
async fn test_existing_topology_is_loaded_at_startup() {
    let store = Arc::new(MemoryStore::new());
    remote_write(&store, node("a", &["pa", "pa2"])).await;
    remote_write(&store, node("b", &["pb"])).await;
    remote_write(&store, undirected("l1", "pa", "pb")).await;
    remote_write(&store, Link::directed("pa2", "ghost").with_id("dangling")).await;

    let grapher = Grapher::connect(store.clone(), GraphMode::Live).await.unwrap();
    assert_eq!(grapher.mode(), GraphMode::Live);
    assert_eq!(grapher.stats().edges, 2);

    // live mode keeps waiting for the missing owner
    assert_eq!(grapher.pending_links(), vec![LinkId::new("dangling")]);
}

// ============================================================================
// Local Changes
// ============================================================================

#[tokio::test]
async fn test_add_node_writes_to_store_first() {
    let (store, grapher) = live_grapher().await;

    let id = grapher.add_node("sw1").await.unwrap();
    assert!(store.get(Collection::Nodes, id.as_str()).is_some());
    assert_eq!(grapher.node_id("sw1"), Some(id.clone()));

    assert_eq!(grapher.add_node("sw1").await.unwrap(), id);
    assert_eq!(store.len(Collection::Nodes), 1);
}

#[tokio::test]
async fn test_add_edge_propagates_ports_nodes_and_link() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();

    let mut props = Properties::new();
    props.insert("latency".into(), serde_json::json!(2.5));
    let link = grapher.add_edge(&a, &b, false, props).await.unwrap();

    assert_eq!(store.len(Collection::Ports), 2);
    let Some(Entity::Node(stored_a)) = store.get(Collection::Nodes, a.as_str()) else {
        panic!("node a missing from store");
    };
    assert_eq!(stored_a.ports.len(), 1);
    assert!(store.get(Collection::Links, link.as_str()).is_some());

    assert_eq!(grapher.stats().edges, 2);
    settle().await;
    assert_eq!(grapher.stats().edges, 2);
    assert!(grapher.check_invariants().is_empty());
}

#[tokio::test]
async fn test_rapid_edges_survive_stale_echoes() {
    let (_store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();

    for _ in 0..5 {
        grapher
            .add_edge(&a, &b, true, Properties::new())
            .await
            .unwrap();
        assert!(grapher.check_invariants().is_empty());
    }
    settle().await;

    assert_eq!(grapher.stats().links, 5);
    assert_eq!(grapher.with_graph(|g| g.out_degree(&a)), 5);
    assert!(grapher.check_invariants().is_empty());
}

#[tokio::test]
async fn test_removed_edge_is_not_revived_by_late_echo() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    let link = grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap();

    let removed = grapher.remove_edge(&a, &b, None).await.unwrap();
    assert_eq!(removed, vec![link.clone()]);
    settle().await;

    assert_eq!(grapher.stats().edges, 0);
    assert!(store.get(Collection::Links, link.as_str()).is_none());
    assert_eq!(store.len(Collection::Ports), 0);
    grapher.with_graph(|g| assert!(g.node(&a).unwrap().ports.is_empty()));
}

#[tokio::test]
async fn test_remove_named_link_checks_endpoints() {
    let (_store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    let c = grapher.add_node("c").await.unwrap();
    let ab = grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap();
    grapher
        .add_edge(&b, &c, false, Properties::new())
        .await
        .unwrap();

    let err = grapher.remove_edge(&a, &c, Some(&ab)).await.unwrap_err();
    assert!(matches!(
        err,
        GrapherError::Graph(GraphError::LinkNotBetween { .. })
    ));

    // argument order does not matter for an undirected link
    assert_eq!(grapher.remove_edge(&b, &a, Some(&ab)).await.unwrap(), vec![ab]);
    assert_eq!(grapher.stats().links, 1);
}

#[tokio::test]
async fn test_remove_incomplete_link_is_refused() {
    let (store, grapher) = live_grapher().await;
    remote_write(&store, node("a", &["pa"])).await;
    remote_write(&store, node("b", &[])).await;
    remote_write(&store, Link::directed("pa", "pz").with_id("half")).await;
    eventually("nodes applied", || grapher.stats().nodes == 2).await;
    eventually("link seen", || grapher.stats().pending == 1).await;

    let err = grapher
        .remove_edge(&NodeId::new("a"), &NodeId::new("b"), Some(&LinkId::new("half")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GrapherError::Graph(GraphError::IncompleteLink { .. })
    ));
    assert!(store.get(Collection::Links, "half").is_some());
}

#[tokio::test]
async fn test_remove_node_leaves_links_pending() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    let link = grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap();

    let removed = grapher.remove_node(&b).await.unwrap();
    assert_eq!(removed.name, "b");
    settle().await;

    assert!(store.get(Collection::Nodes, b.as_str()).is_none());
    assert_eq!(grapher.stats().nodes, 1);
    assert_eq!(grapher.pending_links(), vec![link]);
    assert!(grapher.check_invariants().is_empty());
}

#[tokio::test]
async fn test_staged_commit_mode() {
    let store = Arc::new(MemoryStore::new());
    let grapher = Grapher::live(store.clone()).await.unwrap().with_commit(false);

    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    grapher
        .add_edge(&a, &b, true, Properties::new())
        .await
        .unwrap();

    assert_eq!(store.staged_len(), 0);
    assert_eq!(store.len(Collection::Links), 1);
    assert_eq!(grapher.stats().edges, 1);
}

#[tokio::test]
async fn test_add_edge_keeps_concurrent_node_update() {
    let inner = Arc::new(MemoryStore::new());
    remote_write(&inner, node("a", &[])).await;
    remote_write(&inner, node("b", &[])).await;
    let grapher = Grapher::live(Arc::new(InterleavedStore::new(inner.clone())))
        .await
        .unwrap();
    let (a, b) = (NodeId::new("a"), NodeId::new("b"));
    let px = PortId::new("px");

    let link = grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap();

    let Some(Entity::Node(stored)) = inner.get(Collection::Nodes, "a") else {
        panic!("node a missing from store");
    };
    assert_eq!(stored.ports.len(), 2);
    assert!(stored.owns(&px));

    eventually("mirror holds both ports of a", || {
        grapher.with_graph(|g| {
            g.node(&a).is_some_and(|n| n.owns(&px) && n.ports.len() == 2) && g.is_materialized(&link)
        })
    })
    .await;
    assert!(grapher.check_invariants().is_empty());
}

// ============================================================================
// Store Failures
// ============================================================================

#[tokio::test]
async fn test_failed_store_write_leaves_mirror_unchanged() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    let before = grapher.with_graph(edge_summary);
    let stats = grapher.stats();

    store.set_offline(true);

    let err = grapher.add_node("c").await.unwrap_err();
    assert!(matches!(err, GrapherError::Store(StoreError::Unavailable(_))));
    let err = grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GrapherError::Store(_)));
    assert!(grapher.remove_node(&a).await.is_err());

    assert_eq!(grapher.stats(), stats);
    assert_eq!(grapher.with_graph(edge_summary), before);
    assert_eq!(grapher.node_id("c"), None);

    // once the store is back, the same calls go through
    store.set_offline(false);
    grapher.add_node("c").await.unwrap();
    grapher
        .add_edge(&a, &b, false, Properties::new())
        .await
        .unwrap();
    settle().await;
    assert_eq!(grapher.stats().nodes, 3);
    assert_eq!(grapher.stats().links, 1);
}

#[tokio::test]
async fn test_failed_removal_keeps_edge() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    let b = grapher.add_node("b").await.unwrap();
    grapher
        .add_edge(&a, &b, true, Properties::new())
        .await
        .unwrap();

    store.set_offline(true);
    assert!(grapher.remove_edge(&a, &b, None).await.is_err());
    assert_eq!(grapher.stats().edges, 1);

    // the link was not tombstoned, so later updates still apply
    store.set_offline(false);
    let link = grapher.with_graph(|g| g.links().next().cloned()).unwrap();
    let Some(Entity::Link(stored)) = store.get(Collection::Links, link.as_str()) else {
        panic!("link missing from store");
    };
    remote_write(&store, stored.with_property("capacity", 40)).await;
    eventually("property update applied", || {
        grapher.with_graph(|g| {
            g.link_edges(&link)
                .iter()
                .any(|(_, _, data)| data.attribute("capacity").is_some())
        })
    })
    .await;
}

#[tokio::test]
async fn test_apply_event_applies_unexpected_update() {
    let (store, grapher) = live_grapher().await;
    let a = grapher.add_node("a").await.unwrap();
    settle().await;

    let Some(entity) = store.get(Collection::Nodes, a.as_str()) else {
        panic!("node missing from store");
    };
    // not expected as an echo, so it is applied like any foreign event
    assert!(grapher.apply_event(StoreEvent::Updated(entity)).unwrap());
    assert_eq!(grapher.stats().nodes, 1);
}
