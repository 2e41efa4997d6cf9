//! Mirror graph store.
//!
//! A petgraph-based directed multigraph whose vertices are topology nodes and
//! whose edges are keyed by link identity. An undirected link always occupies
//! two opposite edges; a directed link occupies one.
//!
//! Structural mutation is crate-private: outside code gets a read-only surface
//! and must go through [`EventAdapter`](crate::EventAdapter) (or the grapher
//! built on it) to change the mirror.

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

use crate::error::GraphError;
use crate::model::{Link, LinkId, Node, NodeId, PortId, Properties};

// ============================================================================
// Edge Data
// ============================================================================

/// Edge weight stored in the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    /// Link this edge materializes
    pub link: LinkId,
    /// Port on the edge's tail vertex
    pub source: PortId,
    /// Port on the edge's head vertex
    pub sink: PortId,
    /// Whether the link is directed (false: this edge has a reverse twin)
    pub directed: bool,
    /// Link properties as they were when the edge was materialized
    pub properties: Properties,
    /// Attributes attached explicitly for weighted algorithms
    pub weights: BTreeMap<String, Value>,
}

impl EdgeData {
    fn new(link: &Link, source: &PortId, sink: &PortId, weights: BTreeMap<String, Value>) -> Self {
        Self {
            link: link.id.clone(),
            source: source.clone(),
            sink: sink.clone(),
            directed: link.is_directed(),
            properties: link.properties.clone(),
            weights,
        }
    }

    /// Numeric value of an attached weight attribute
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.weights.get(name).and_then(Value::as_f64)
    }

    /// Look up an attribute: attached weights first, then the property snapshot
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.weights
            .get(name)
            .or_else(|| self.properties.get(name))
    }
}

/// A broken structural invariant, as reported by the invariant checkers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Link has some but not all of its expected edges
    PartialLink {
        link: LinkId,
        expected: usize,
        found: usize,
    },
    /// Edge exists in the graph but is not tracked under its link
    UntrackedEdge { link: LinkId },
    /// Materialized link whose endpoint port has no known owner
    UnresolvedEndpoint { link: LinkId, port: PortId },
    /// Materialized edge attached to a vertex other than its port's owner
    MisplacedEdge { link: LinkId, port: PortId },
    /// Both owners are known but the link has no edges
    Unmaterialized { link: LinkId },
}

// ============================================================================
// Mirror Graph
// ============================================================================

/// The local view of the topology.
///
/// Backed by `petgraph::StableGraph` so indices stay valid across removals.
/// Every edge is indexed by its link id, which makes dematerialization exact
/// regardless of how the link's endpoints or directedness change.
///
/// Structural mutators are not part of the public surface:
///
/// ```compile_fail
/// let mut mirror = topomirror_core::MirrorGraph::new();
/// mirror.add_vertex(topomirror_core::Node::new("sw1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MirrorGraph {
    /// The underlying petgraph instance
    graph: StableGraph<Node, EdgeData, petgraph::Directed>,

    /// Map from node id to petgraph NodeIndex for O(1) lookup
    node_index: HashMap<NodeId, NodeIndex>,

    /// Edges created for each materialized link
    link_edges: HashMap<LinkId, Vec<EdgeIndex>>,
}

impl MirrorGraph {
    /// Create an empty mirror
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Sanctioned Mutation
    // ------------------------------------------------------------------------

    /// Insert a node as a vertex.
    ///
    /// A node already present keeps its vertex (and edges); only its stored
    /// data is refreshed. Returns true if a new vertex was created.
    pub(crate) fn add_vertex(&mut self, node: Node) -> bool {
        if let Some(&idx) = self.node_index.get(&node.id) {
            if let Some(weight) = self.graph.node_weight_mut(idx) {
                *weight = node;
            }
            return false;
        }

        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        trace!(node = %id, "added vertex");
        self.node_index.insert(id, idx);
        true
    }

    /// Remove a vertex and every link with an edge incident to it.
    ///
    /// Returns the node together with the links that were dematerialized.
    pub(crate) fn remove_vertex(&mut self, id: &NodeId) -> Option<(Node, Vec<LinkId>)> {
        let idx = *self.node_index.get(id)?;

        let mut links: Vec<LinkId> = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in self.graph.edges_directed(idx, direction) {
                if !links.contains(&edge.weight().link) {
                    links.push(edge.weight().link.clone());
                }
            }
        }
        for link in &links {
            self.dematerialize(link);
        }

        self.node_index.remove(id);
        let node = self.graph.remove_node(idx)?;
        debug!(node = %id, links = links.len(), "removed vertex");
        Some((node, links))
    }

    /// Add the edge(s) for a link whose endpoint owners are both resolved.
    ///
    /// One edge `owner_a -> owner_b` for a directed link; for an undirected link
    /// a second edge `owner_b -> owner_a` with source and sink swapped. A link
    /// that is already materialized is replaced, carrying over any attached
    /// weights. Returns the number of edges created.
    pub(crate) fn materialize(
        &mut self,
        link: &Link,
        owner_a: &NodeId,
        owner_b: &NodeId,
        port_a: &PortId,
        port_b: &PortId,
    ) -> Result<usize, GraphError> {
        let (Some(&a), Some(&b)) = (self.node_index.get(owner_a), self.node_index.get(owner_b))
        else {
            return Err(GraphError::incomplete_link(link.id.clone()));
        };

        let weights = self
            .take_link_edges(&link.id)
            .into_iter()
            .next()
            .map(|data| data.weights)
            .unwrap_or_default();

        let mut edges = vec![self
            .graph
            .add_edge(a, b, EdgeData::new(link, port_a, port_b, weights.clone()))];
        if !link.is_directed() {
            edges.push(
                self.graph
                    .add_edge(b, a, EdgeData::new(link, port_b, port_a, weights)),
            );
        }

        let count = edges.len();
        self.link_edges.insert(link.id.clone(), edges);
        debug!(link = %link.id, from = %owner_a, to = %owner_b, edges = count, "materialized link");
        Ok(count)
    }

    /// Remove every edge keyed by the link. A link with no edges is a no-op.
    ///
    /// Returns the number of edges removed.
    pub(crate) fn dematerialize(&mut self, link: &LinkId) -> usize {
        let removed = self.take_link_edges(link).len();
        if removed > 0 {
            debug!(link = %link, edges = removed, "dematerialized link");
        }
        removed
    }

    /// Set an explicit attribute on every edge of a link.
    pub(crate) fn set_weight(&mut self, link: &LinkId, name: &str, value: Value) -> usize {
        let Some(edges) = self.link_edges.get(link) else {
            return 0;
        };
        let mut updated = 0;
        for &idx in edges {
            if let Some(data) = self.graph.edge_weight_mut(idx) {
                data.weights.insert(name.to_string(), value.clone());
                updated += 1;
            }
        }
        updated
    }

    fn take_link_edges(&mut self, link: &LinkId) -> Vec<EdgeData> {
        self.link_edges
            .remove(link)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|idx| self.graph.remove_edge(idx))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Node Queries
    // ------------------------------------------------------------------------

    /// Get the number of vertices
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the mirror contains a vertex for the node
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    /// Get a node by id
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Find the first node with the given display name
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.graph.node_weights().find(|n| n.name == name)
    }

    /// Get the NodeIndex for a node id
    pub fn node_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Distinct successors of a node (heads of its outgoing edges)
    pub fn neighbors(&self, id: &NodeId) -> Vec<&Node> {
        let Some(idx) = self.node_index(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter(|n| seen.insert(*n))
            .filter_map(|n| self.graph.node_weight(n))
            .collect()
    }

    /// Number of outgoing edges
    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.degree_in(id, Direction::Outgoing)
    }

    /// Number of incoming edges
    pub fn in_degree(&self, id: &NodeId) -> usize {
        self.degree_in(id, Direction::Incoming)
    }

    /// Total number of incident edges
    pub fn degree(&self, id: &NodeId) -> usize {
        self.out_degree(id) + self.in_degree(id)
    }

    fn degree_in(&self, id: &NodeId, direction: Direction) -> usize {
        self.node_index(id)
            .map(|idx| self.graph.edges_directed(idx, direction).count())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Edge Queries
    // ------------------------------------------------------------------------

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of links currently materialized
    pub fn link_count(&self) -> usize {
        self.link_edges.len()
    }

    /// Check whether a link has edges in the mirror
    pub fn is_materialized(&self, link: &LinkId) -> bool {
        self.link_edges.contains_key(link)
    }

    /// Iterate over all edges as (tail, head, data)
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node, &EdgeData)> {
        self.graph.edge_references().filter_map(move |edge_ref| {
            let source = self.graph.node_weight(edge_ref.source())?;
            let target = self.graph.node_weight(edge_ref.target())?;
            Some((source, target, edge_ref.weight()))
        })
    }

    /// Edges running from `a` to `b`
    pub fn edges_between(&self, a: &NodeId, b: &NodeId) -> Vec<&EdgeData> {
        let (Some(ia), Some(ib)) = (self.node_index(a), self.node_index(b)) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(ia, Direction::Outgoing)
            .filter(|edge_ref| edge_ref.target() == ib)
            .map(|edge_ref| edge_ref.weight())
            .collect()
    }

    /// Edges materialized for a link, as (tail, head, data)
    pub fn link_edges(&self, link: &LinkId) -> Vec<(&Node, &Node, &EdgeData)> {
        let Some(edges) = self.link_edges.get(link) else {
            return Vec::new();
        };
        edges
            .iter()
            .filter_map(|&idx| {
                let (s, t) = self.graph.edge_endpoints(idx)?;
                Some((
                    self.graph.node_weight(s)?,
                    self.graph.node_weight(t)?,
                    self.graph.edge_weight(idx)?,
                ))
            })
            .collect()
    }

    /// Ids of all materialized links
    pub fn links(&self) -> impl Iterator<Item = &LinkId> {
        self.link_edges.keys()
    }

    // ------------------------------------------------------------------------
    // Low-level Access (read only)
    // ------------------------------------------------------------------------

    /// Get a reference to the underlying petgraph, for use with `petgraph::algo`
    pub fn inner(&self) -> &StableGraph<Node, EdgeData, petgraph::Directed> {
        &self.graph
    }

    /// Check the structural invariants the mirror can verify on its own:
    /// every link has all of its edges, and every edge is tracked.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for (link, edges) in &self.link_edges {
            let present: Vec<&EdgeData> = edges
                .iter()
                .filter_map(|&idx| self.graph.edge_weight(idx))
                .collect();
            let expected = match present.first() {
                Some(data) if data.directed => 1,
                _ => 2,
            };
            if present.len() != expected {
                violations.push(InvariantViolation::PartialLink {
                    link: link.clone(),
                    expected,
                    found: present.len(),
                });
            }
        }

        for edge_ref in self.graph.edge_references() {
            let tracked = self
                .link_edges
                .get(&edge_ref.weight().link)
                .is_some_and(|edges| edges.contains(&edge_ref.id()));
            if !tracked {
                violations.push(InvariantViolation::UntrackedEdge {
                    link: edge_ref.weight().link.clone(),
                });
            }
        }

        violations
    }
}
