//! Path queries over the mirror.
//!
//! Thin wrappers that answer in terms of node ids rather than petgraph
//! indices. Anything more elaborate can run directly on
//! [`MirrorGraph::inner`].

use petgraph::algo::astar;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

use crate::mirror::MirrorGraph;
use crate::model::NodeId;

impl MirrorGraph {
    /// Hop-count shortest paths from `source` to every reachable node.
    ///
    /// Follows outgoing edges only, so a directed link is traversed one way
    /// and an undirected link both ways. Each path starts at `source` and
    /// ends at the key; the source maps to itself. Empty if the source is
    /// not in the mirror.
    pub fn shortest_paths_from(&self, source: &NodeId) -> HashMap<NodeId, Vec<NodeId>> {
        let mut paths = HashMap::new();
        let Some(start) = self.node_index(source) else {
            return paths;
        };
        let graph = self.inner();

        paths.insert(source.clone(), vec![source.clone()]);
        let mut queue = VecDeque::from([start]);

        while let Some(idx) = queue.pop_front() {
            let Some(current) = graph.node_weight(idx) else {
                continue;
            };
            let prefix = paths.get(&current.id).cloned().unwrap_or_default();

            for next in graph.neighbors_directed(idx, Direction::Outgoing) {
                let Some(node) = graph.node_weight(next) else {
                    continue;
                };
                if paths.contains_key(&node.id) {
                    continue;
                }
                let mut path = prefix.clone();
                path.push(node.id.clone());
                paths.insert(node.id.clone(), path);
                queue.push_back(next);
            }
        }

        paths
    }

    /// Cheapest path between two nodes.
    ///
    /// With `weight` set, each edge costs its attached weight attribute of
    /// that name (see [`EventAdapter::add_weight`](crate::EventAdapter::add_weight)),
    /// falling back to `default_weight` when the edge has none. Without it,
    /// every edge costs `default_weight`. Returns the total cost and the node
    /// sequence, or `None` if `to` is unreachable.
    pub fn shortest_path(
        &self,
        from: &NodeId,
        to: &NodeId,
        weight: Option<&str>,
        default_weight: f64,
    ) -> Option<(f64, Vec<NodeId>)> {
        let start = self.node_index(from)?;
        let goal = self.node_index(to)?;
        let graph = self.inner();

        let (cost, path) = astar(
            graph,
            start,
            |idx| idx == goal,
            |edge| {
                weight
                    .and_then(|name| edge.weight().weight(name))
                    .unwrap_or(default_weight)
            },
            |_| 0.0,
        )?;

        let ids = path
            .into_iter()
            .filter_map(|idx| graph.node_weight(idx).map(|n| n.id.clone()))
            .collect();
        Some((cost, ids))
    }

    /// Node ids of every edge touching `id`, either direction, deduplicated.
    pub fn adjacent(&self, id: &NodeId) -> Vec<NodeId> {
        let Some(idx) = self.node_index(id) else {
            return Vec::new();
        };
        let graph = self.inner();
        let mut out: Vec<NodeId> = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in graph.edges_directed(idx, direction) {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                if let Some(node) = graph.node_weight(other) {
                    if !out.contains(&node.id) {
                        out.push(node.id.clone());
                    }
                }
            }
        }
        out
    }
}
