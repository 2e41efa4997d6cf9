//! Public graph API.
//!
//! [`Grapher`] is the only sanctioned way to change the mirror from
//! application code. In live mode every change is written to the topology
//! store first and applied to the mirror only once the store accepted it; a
//! background task keeps applying the store's notifications. In static mode
//! the mirror is built once from a snapshot and changes stay local.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use topomirror_config::GraphMode;
use topomirror_core::{
    GraphError, InvariantViolation, Link, LinkId, MirrorGraph, Node, NodeId, Port, PortId,
    Properties,
};
use topomirror_store::{Collection, Entity, StoreError, StoreEvent, TopologySnapshot, TopologyStore};

use crate::shared::{key_of, EntityKey, MirrorState, SharedMirror};
use crate::Result;

/// Counts describing the current mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Vertices
    pub nodes: usize,
    /// Directed edges (an undirected link counts twice)
    pub edges: usize,
    /// Materialized links
    pub links: usize,
    /// Known links still waiting for an endpoint owner
    pub pending: usize,
}

/// Facade over the mirror graph.
///
/// Mutating calls are async because live mode talks to the store. They are
/// serialized among themselves by an async mutex that is distinct from the
/// mirror lock, so readers never wait on network I/O.
pub struct Grapher {
    shared: Arc<SharedMirror>,
    mode: GraphMode,
    store: Option<Arc<dyn TopologyStore>>,
    commit: bool,

    /// Node names created or found through this API
    registry: Mutex<HashMap<String, NodeId>>,

    apply_task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Grapher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grapher")
            .field("mode", &self.mode)
            .field("commit", &self.commit)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl Drop for Grapher {
    fn drop(&mut self) {
        if let Some(task) = self.apply_task.take() {
            task.abort();
        }
    }
}

impl Grapher {
    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    fn from_state(state: MirrorState, mode: GraphMode, store: Option<Arc<dyn TopologyStore>>) -> Self {
        Self {
            shared: Arc::new(SharedMirror::from_state(state)),
            mode,
            store,
            commit: true,
            registry: Mutex::new(HashMap::new()),
            apply_task: None,
        }
    }

    /// Create an empty static grapher.
    pub fn new_static() -> Self {
        Self::from_state(MirrorState::default(), GraphMode::Static, None)
    }

    /// Build a static grapher from a snapshot.
    ///
    /// Links whose endpoints do not resolve within the snapshot are dropped.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Self {
        let mut state = MirrorState::default();
        state.load_snapshot(snapshot);
        let dropped = state.adapter.drop_pending(&state.mirror);
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropped links with unresolved endpoints");
        }
        Self::from_state(state, GraphMode::Static, None)
    }

    /// Build a static grapher from the current contents of a store.
    pub async fn load_static(store: &dyn TopologyStore) -> Result<Self> {
        let snapshot = store.snapshot().await?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Build a live grapher following `store`.
    ///
    /// Subscribes before taking the snapshot so no change falls in between,
    /// then spawns the apply loop. Must be called within a tokio runtime.
    pub async fn live(store: Arc<dyn TopologyStore>) -> Result<Self> {
        let events = store.subscribe();
        let snapshot = store.snapshot().await?;

        let mut state = MirrorState::default();
        state.load_snapshot(snapshot);
        let mut grapher = Self::from_state(state, GraphMode::Live, Some(store));

        let shared = Arc::clone(&grapher.shared);
        grapher.apply_task = Some(tokio::spawn(apply_loop(shared, events)));
        Ok(grapher)
    }

    /// Build a grapher in the given mode.
    pub async fn connect(store: Arc<dyn TopologyStore>, mode: GraphMode) -> Result<Self> {
        match mode {
            GraphMode::Live => Self::live(store).await,
            GraphMode::Static => Self::load_static(store.as_ref()).await,
        }
    }

    /// Choose between committing every store write (the default) and
    /// staging the writes of one operation and committing them together.
    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add a node named `name`, or return the existing one.
    ///
    /// Idempotent by name: a node created earlier through this API, or any
    /// vertex in the mirror with that name, is returned instead of a new one.
    pub async fn add_node(&self, name: &str) -> Result<NodeId> {
        let mut registry = self.registry.lock().await;

        let known = registry.get(name).cloned();
        let existing = self.shared.read(|s| {
            known
                .filter(|id| s.mirror.contains_node(id))
                .or_else(|| s.mirror.node_by_name(name).map(|n| n.id.clone()))
        });
        if let Some(id) = existing {
            debug!(node = %id, name, "node already present");
            registry.insert(name.to_string(), id.clone());
            return Ok(id);
        }

        let node = Node::new(name);
        let id = node.id.clone();
        self.propagate(vec![Entity::Node(node.clone())]).await?;
        self.shared
            .write("add_node", |s| s.apply_entity(Entity::Node(node)))?;

        registry.insert(name.to_string(), id.clone());
        debug!(node = %id, name, "added node");
        Ok(id)
    }

    /// Connect two nodes with a new link.
    ///
    /// Allocates a fresh port on each node, appends it to the node's port
    /// list and creates the link between the two ports. Returns the link id.
    pub async fn add_edge(
        &self,
        a: &NodeId,
        b: &NodeId,
        directed: bool,
        properties: Properties,
    ) -> Result<LinkId> {
        let _serial = self.registry.lock().await;

        let missing = self.shared.read(|s| {
            [a, b]
                .into_iter()
                .find(|id| !s.mirror.contains_node(id))
                .cloned()
        });
        if let Some(id) = missing {
            return Err(GraphError::node_not_found(id.as_str()).into());
        }

        let (port_a, port_b) = (Port::new(), Port::new());
        let mut link = if directed {
            Link::directed(port_a.id.clone(), port_b.id.clone())
        } else {
            Link::undirected(port_a.id.clone(), port_b.id.clone())
        };
        link.properties = properties;

        // the owners are read only once their new ports exist, so a node
        // update made by another client meanwhile is built upon, not lost
        let (new_a, new_b) = (port_a.id.clone(), port_b.id.clone());
        self.propagate(vec![Entity::Port(port_a), Entity::Port(port_b)])
            .await?;

        let mut node_a = self.current_node(a).await?;
        node_a.ports.push(new_a);
        let mut nodes = Vec::with_capacity(2);
        if a == b {
            node_a.ports.push(new_b);
            nodes.push(node_a);
        } else {
            let mut node_b = self.current_node(b).await?;
            node_b.ports.push(new_b);
            nodes.push(node_a);
            nodes.push(node_b);
        }

        let mut entities: Vec<Entity> = nodes.iter().cloned().map(Entity::Node).collect();
        entities.push(Entity::Link(link.clone()));
        self.propagate(entities).await?;

        let id = link.id.clone();
        self.shared.write("add_edge", |s| {
            for node in nodes {
                s.apply_entity(Entity::Node(node));
            }
            s.apply_entity(Entity::Link(link));
        })?;

        debug!(link = %id, from = %a, to = %b, directed, "added edge");
        Ok(id)
    }

    /// Remove links between two nodes.
    ///
    /// With `link` set, only that link is removed; it must have both
    /// endpoint owners resolved (`IncompleteLink` otherwise) and must join
    /// `a` and `b`. Without it, every link between the pair is removed, in
    /// either direction. Ports left unused are deleted and detached from
    /// their nodes. Returns the removed link ids.
    pub async fn remove_edge(
        &self,
        a: &NodeId,
        b: &NodeId,
        link: Option<&LinkId>,
    ) -> Result<Vec<LinkId>> {
        let _serial = self.registry.lock().await;

        let plan = self.shared.read(|s| EdgeRemoval::plan(s, a, b, link))?;
        if plan.links.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(store) = self.live_store() {
            let keys = plan.keys();
            self.shared.write("remove_edge", |s| s.tombstone(&keys))?;
            for (done, (collection, id)) in keys.iter().enumerate() {
                if let Err(err) = remove_remote(store, *collection, id).await {
                    self.shared
                        .write("remove_edge", |s| s.revive(&keys[done..]))?;
                    warn!(error = %err, "store removal failed, mirror left unchanged");
                    return Err(err.into());
                }
            }
        }

        let nodes = self.detach_ports(&plan).await?;
        self.propagate(nodes.iter().cloned().map(Entity::Node).collect())
            .await?;

        let EdgeRemoval { links, ports, .. } = plan;
        self.shared.write("remove_edge", |s| {
            for id in &links {
                if let Err(err) = s.adapter.remove_link(&mut s.mirror, id) {
                    debug!(link = %id, error = %err, "link already gone");
                }
            }
            for port in &ports {
                s.adapter.forget_port(port);
            }
            for node in nodes {
                s.apply_entity(Entity::Node(node));
            }
        })?;

        debug!(from = %a, to = %b, count = links.len(), "removed edges");
        Ok(links)
    }

    /// Remove a node.
    ///
    /// Links through its ports are not removed; they go back to waiting for
    /// an owner.
    pub async fn remove_node(&self, id: &NodeId) -> Result<Node> {
        let mut registry = self.registry.lock().await;

        if !self.shared.read(|s| s.mirror.contains_node(id)) {
            return Err(GraphError::node_not_found(id.as_str()).into());
        }

        if let Some(store) = self.live_store() {
            let keys = vec![(Collection::Nodes, id.to_string())];
            self.shared.write("remove_node", |s| s.tombstone(&keys))?;
            if let Err(err) = remove_remote(store, Collection::Nodes, id.as_str()).await {
                self.shared.write("remove_node", |s| s.revive(&keys))?;
                warn!(node = %id, error = %err, "store removal failed, mirror left unchanged");
                return Err(err.into());
            }
        }

        let node = self
            .shared
            .write("remove_node", |s| s.adapter.remove_node(&mut s.mirror, id))??;
        registry.retain(|_, known| known != id);
        debug!(node = %id, name = %node.name, "removed node");
        Ok(node)
    }

    /// Copy link property `name` onto every currently materialized edge.
    ///
    /// A one-time snapshot: later links do not get it. Returns the number of
    /// edges updated. Refused inside a [`with_graph`](Self::with_graph) window.
    pub fn add_weight(&self, name: &str) -> Result<usize> {
        let updated = self
            .shared
            .write("add_weight", |s| s.adapter.add_weight(&mut s.mirror, name))?;
        debug!(weight = name, edges = updated, "attached weight");
        Ok(updated)
    }

    /// Apply a store notification directly.
    ///
    /// The live apply loop does this for every subscribed event; callers
    /// delivering events some other way can use it too. Returns false if
    /// the event was skipped as stale.
    pub fn apply_event(&self, event: StoreEvent) -> Result<bool> {
        Ok(self.shared.write("apply_event", |s| s.apply(event))?)
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Run `f` against the mirror under the shared lock.
    ///
    /// No change can land while `f` runs, and the lock is released however
    /// `f` exits, panics included. Structural changes attempted from inside
    /// `f` fail with `OperationProhibited`.
    pub fn with_graph<R>(&self, f: impl FnOnce(&MirrorGraph) -> R) -> R {
        self.shared.read(|s| f(&s.mirror))
    }

    /// Id of the node with the given name
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.with_graph(|g| g.node_by_name(name).map(|n| n.id.clone()))
    }

    pub fn stats(&self) -> MirrorStats {
        self.shared.read(|s| MirrorStats {
            nodes: s.mirror.node_count(),
            edges: s.mirror.edge_count(),
            links: s.mirror.link_count(),
            pending: s.adapter.pending_links(&s.mirror).count(),
        })
    }

    /// Ids of known links still waiting for an endpoint owner
    pub fn pending_links(&self) -> Vec<LinkId> {
        self.shared.read(|s| {
            s.adapter
                .pending_links(&s.mirror)
                .map(|l| l.id.clone())
                .collect()
        })
    }

    /// Every broken invariant between the mirror and the backreferences
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.shared.read(|s| s.adapter.check_invariants(&s.mirror))
    }

    // ------------------------------------------------------------------------
    // Store Propagation
    // ------------------------------------------------------------------------

    /// Latest known version of a node: the store's copy in live mode, the
    /// mirror's otherwise or when the store does not hold it.
    async fn current_node(&self, id: &NodeId) -> Result<Node> {
        if let Some(store) = self.live_store() {
            if let Some(Entity::Node(node)) = store.fetch(Collection::Nodes, id.as_str()).await? {
                return Ok(node);
            }
        }
        self.shared
            .read(|s| s.mirror.node(id).cloned())
            .ok_or_else(|| GraphError::node_not_found(id.as_str()).into())
    }

    /// Owners of the ports being deleted, with those ports detached.
    async fn detach_ports(&self, plan: &EdgeRemoval) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(plan.owners.len());
        for owner in &plan.owners {
            let mut node = self.current_node(owner).await?;
            node.ports.retain(|port| !plan.ports.contains(port));
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn live_store(&self) -> Option<&dyn TopologyStore> {
        match self.mode {
            GraphMode::Live => self.store.as_deref(),
            GraphMode::Static => None,
        }
    }

    /// Write entities to the store, in order. No-op outside live mode.
    ///
    /// Echoes of these writes are registered first so the apply loop can
    /// tell them from newer state. On failure the unsent ones are cancelled.
    async fn propagate(&self, entities: Vec<Entity>) -> Result<()> {
        let Some(store) = self.live_store() else {
            return Ok(());
        };
        if entities.is_empty() {
            return Ok(());
        }

        let keys: Vec<EntityKey> = entities.iter().map(key_of).collect();
        self.shared.write("propagate", |s| s.expect_echo(&keys))?;

        let mut written = 0;
        let mut failure: Option<StoreError> = None;
        for entity in entities {
            match store.insert(entity, self.commit).await {
                Ok(_) => written += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() && !self.commit {
            failure = store.commit().await.err();
        }

        if let Some(err) = failure {
            let echoed = if self.commit { written } else { 0 };
            self.shared
                .write("propagate", |s| s.cancel_echo(&keys[echoed..]))?;
            warn!(error = %err, written, "store propagation failed, mirror left unchanged");
            return Err(err.into());
        }
        Ok(())
    }
}

/// Delete an entity from the store; an already absent entity counts as removed.
async fn remove_remote(
    store: &dyn TopologyStore,
    collection: Collection,
    id: &str,
) -> std::result::Result<(), StoreError> {
    match store.remove(collection, id).await {
        Err(StoreError::NotFound { .. }) => {
            debug!(%collection, id, "entity already absent from store");
            Ok(())
        }
        other => other,
    }
}

/// Applies store notifications until the subscription closes.
async fn apply_loop(shared: Arc<SharedMirror>, mut events: UnboundedReceiver<StoreEvent>) {
    info!("apply loop started");
    while let Some(event) = events.recv().await {
        if let Err(err) = shared.write("apply_event", |s| s.apply(event)) {
            warn!(error = %err, "failed to apply store event");
        }
    }
    debug!("store subscription closed, apply loop exiting");
}

/// What `remove_edge` is about to delete.
#[derive(Debug, Default)]
struct EdgeRemoval {
    links: Vec<LinkId>,
    /// Ports no remaining link uses
    ports: Vec<PortId>,
    /// Nodes owning those ports
    owners: Vec<NodeId>,
}

impl EdgeRemoval {
    fn plan(
        state: &MirrorState,
        a: &NodeId,
        b: &NodeId,
        link: Option<&LinkId>,
    ) -> std::result::Result<Self, GraphError> {
        for id in [a, b] {
            if !state.mirror.contains_node(id) {
                return Err(GraphError::node_not_found(id.as_str()));
            }
        }

        let links = match link {
            Some(id) => {
                let (x, y) = state.adapter.resolve_owners(id)?;
                let connects = (&x == a && &y == b) || (&x == b && &y == a);
                if !connects {
                    return Err(GraphError::LinkNotBetween {
                        link: id.clone(),
                        a: a.clone(),
                        b: b.clone(),
                    });
                }
                vec![id.clone()]
            }
            None => {
                let mut ids: Vec<LinkId> = Vec::new();
                let forward = state.mirror.edges_between(a, b);
                let backward = state.mirror.edges_between(b, a);
                for data in forward.into_iter().chain(backward) {
                    if !ids.contains(&data.link) {
                        ids.push(data.link.clone());
                    }
                }
                ids
            }
        };

        let mut ports: Vec<PortId> = Vec::new();
        for id in &links {
            let Some(link) = state.adapter.link(id) else {
                continue;
            };
            for port in link.ports() {
                let still_used = state
                    .adapter
                    .links()
                    .any(|other| !links.contains(&other.id) && other.endpoints.touches(port));
                if !still_used && !ports.contains(port) {
                    ports.push(port.clone());
                }
            }
        }

        let mut owners: Vec<NodeId> = Vec::new();
        for port in &ports {
            let Some(owner) = state.adapter.backrefs().owner(port) else {
                continue;
            };
            if !owners.contains(&owner) && state.mirror.contains_node(&owner) {
                owners.push(owner);
            }
        }

        Ok(Self {
            links,
            ports,
            owners,
        })
    }

    /// Store entities to delete: links first, then ports
    fn keys(&self) -> Vec<EntityKey> {
        self.links
            .iter()
            .map(|id| (Collection::Links, id.to_string()))
            .chain(self.ports.iter().map(|id| (Collection::Ports, id.to_string())))
            .collect()
    }
}
