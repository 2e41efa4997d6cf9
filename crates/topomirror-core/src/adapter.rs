//! Event adapter.
//!
//! Turns node and link notifications into backreference updates and mirror
//! mutations. A link is materialized as soon as both of its endpoint ports have
//! a known owner, whichever of the three entities arrives last; until then it
//! waits in the backreference table. Waiting is not an error and has no timeout.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::backref::BackrefTable;
use crate::error::GraphError;
use crate::mirror::{InvariantViolation, MirrorGraph};
use crate::model::{Link, LinkId, Node, NodeId, PortId};

/// Applies topology events to a [`MirrorGraph`].
///
/// Holds the backreference table and the latest version of every link seen.
/// The adapter does no locking of its own; callers serialize access to the
/// adapter and the mirror together.
#[derive(Debug, Default)]
pub struct EventAdapter {
    backrefs: BackrefTable,
    links: HashMap<LinkId, Link>,
}

impl EventAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Event Application
    // ------------------------------------------------------------------------

    /// Apply a node creation or update.
    ///
    /// Binds each listed port to the node and resolves any link waiting on
    /// one of them. Ports the node stopped listing are unbound, and the links
    /// through them are dematerialized until another node claims the port.
    /// Returns the number of links materialized.
    pub fn apply_node(&mut self, mirror: &mut MirrorGraph, node: Node) -> usize {
        let id = node.id.clone();
        let dropped: Vec<PortId> = mirror
            .node(&id)
            .map(|previous| {
                previous
                    .ports
                    .iter()
                    .filter(|port| !node.owns(port))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut candidates: Vec<LinkId> = Vec::new();
        for port in &node.ports {
            if let Some(link) = self.backrefs.bind(port, &id) {
                if !candidates.contains(&link) {
                    candidates.push(link);
                }
            }
        }

        let mut stale: Vec<LinkId> = Vec::new();
        for port in &dropped {
            if self.backrefs.owner(port).as_ref() == Some(&id) {
                if let Some(entry) = self.backrefs.clear(port) {
                    if let Some(link) = entry.pending {
                        self.backrefs.set_pending(port, &link);
                        stale.push(link);
                    }
                }
            }
        }

        let ports = node.ports.len();
        let created = mirror.add_vertex(node);
        debug!(node = %id, created, ports, pending = candidates.len(), "applied node");

        for link in &stale {
            self.try_resolve(mirror, link);
        }
        candidates
            .iter()
            .filter(|link| self.try_resolve(mirror, link))
            .count()
    }

    /// Apply a link creation or update.
    ///
    /// When a known link's endpoints change (including a directed/undirected
    /// flip), its existing edges are removed by link identity before the new
    /// endpoints are resolved. Returns true if the link is now materialized.
    pub fn apply_link(&mut self, mirror: &mut MirrorGraph, link: Link) -> bool {
        let id = link.id.clone();

        if let Some(previous) = self.links.remove(&id) {
            if previous.endpoints != link.endpoints {
                mirror.dematerialize(&id);
                for port in previous.ports() {
                    if !link.endpoints.touches(port) {
                        self.backrefs.release(port, &id);
                    }
                }
                debug!(link = %id, "link endpoints changed");
            }
        }

        for port in link.ports() {
            self.backrefs.set_pending(port, &id);
        }
        self.links.insert(id.clone(), link);
        self.try_resolve(mirror, &id)
    }

    /// Materialize the link if both endpoint owners are known.
    ///
    /// A link that cannot be resolved has any stale edges removed, so the
    /// mirror never holds an edge whose endpoint owner is unknown.
    fn try_resolve(&self, mirror: &mut MirrorGraph, id: &LinkId) -> bool {
        let Some(link) = self.links.get(id) else {
            return false;
        };
        let [port_a, port_b] = link.ports();

        match (self.backrefs.owner(port_a), self.backrefs.owner(port_b)) {
            (Some(a), Some(b)) => match mirror.materialize(link, &a, &b, port_a, port_b) {
                Ok(_) => true,
                Err(err) => {
                    warn!(link = %id, error = %err, "owner has no vertex, deferring link");
                    mirror.dematerialize(id);
                    false
                }
            },
            _ => {
                mirror.dematerialize(id);
                debug!(link = %id, "deferring incomplete link");
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Remove a node's vertex and clear the backreference entries of its ports.
    ///
    /// Links through those ports stay known and go back to waiting for an owner.
    /// A port the node still lists but another node has since claimed keeps
    /// its new owner.
    pub fn remove_node(&mut self, mirror: &mut MirrorGraph, id: &NodeId) -> Result<Node, GraphError> {
        let (node, dematerialized) = mirror
            .remove_vertex(id)
            .ok_or_else(|| GraphError::node_not_found(id.as_str()))?;

        for port in &node.ports {
            if self.backrefs.owner(port).as_ref() != Some(id) {
                continue;
            }
            self.backrefs.clear(port);
            for link in self.links.values().filter(|l| l.endpoints.touches(port)) {
                self.backrefs.set_pending(port, &link.id);
            }
        }

        // edges that ran through the vertex are gone; put back any link
        // whose owners are still both known
        let restored = dematerialized
            .iter()
            .filter(|link| self.try_resolve(mirror, link))
            .count();

        debug!(node = %id, links = dematerialized.len(), restored, "removed node");
        Ok(node)
    }

    /// Forget a link entirely: its edges and its pending registrations.
    pub fn remove_link(&mut self, mirror: &mut MirrorGraph, id: &LinkId) -> Result<Link, GraphError> {
        let link = self
            .links
            .remove(id)
            .ok_or_else(|| GraphError::link_not_found(id.clone()))?;

        mirror.dematerialize(id);
        for port in link.ports() {
            self.backrefs.release(port, id);
        }
        debug!(link = %id, "removed link");
        Ok(link)
    }

    /// Drop all state for a port that no longer exists.
    pub fn forget_port(&self, port: &PortId) {
        self.backrefs.clear(port);
    }

    /// Discard every link that is not materialized.
    ///
    /// Used after a one-shot snapshot load, where nothing will ever arrive to
    /// resolve them. Returns the dropped link ids.
    pub fn drop_pending(&mut self, mirror: &MirrorGraph) -> Vec<LinkId> {
        let dropped: Vec<LinkId> = self
            .links
            .keys()
            .filter(|id| !mirror.is_materialized(id))
            .cloned()
            .collect();

        for id in &dropped {
            if let Some(link) = self.links.remove(id) {
                for port in link.ports() {
                    self.backrefs.release(port, id);
                }
            }
        }
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropped unresolved links");
        }
        dropped
    }

    // ------------------------------------------------------------------------
    // Weights
    // ------------------------------------------------------------------------

    /// Copy property `name` of every materialized link onto its edges.
    ///
    /// One-time snapshot: links materialized afterwards do not get the
    /// attribute. Links lacking the property get `null`. Returns the number
    /// of edges updated.
    pub fn add_weight(&self, mirror: &mut MirrorGraph, name: &str) -> usize {
        let mut updated = 0;
        for link in self.links.values() {
            if !mirror.is_materialized(&link.id) {
                continue;
            }
            let value = link.property(name).cloned().unwrap_or(Value::Null);
            updated += mirror.set_weight(&link.id, name, value);
        }
        updated
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Latest version of a known link
    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// All known links, materialized or not
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Known links that are still waiting for an endpoint owner
    pub fn pending_links<'a>(&'a self, mirror: &'a MirrorGraph) -> impl Iterator<Item = &'a Link> {
        self.links
            .values()
            .filter(move |link| !mirror.is_materialized(&link.id))
    }

    pub fn backrefs(&self) -> &BackrefTable {
        &self.backrefs
    }

    /// Owners of both endpoints of a link.
    ///
    /// Fails with `IncompleteLink` if either owner is unknown.
    pub fn resolve_owners(&self, id: &LinkId) -> Result<(NodeId, NodeId), GraphError> {
        let link = self
            .links
            .get(id)
            .ok_or_else(|| GraphError::link_not_found(id.clone()))?;
        let [port_a, port_b] = link.ports();
        match (self.backrefs.owner(port_a), self.backrefs.owner(port_b)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(GraphError::incomplete_link(id.clone())),
        }
    }

    /// Check whether any known link other than `except` uses the port
    pub fn is_port_referenced(&self, port: &PortId, except: &LinkId) -> bool {
        self.links
            .values()
            .any(|link| &link.id != except && link.endpoints.touches(port))
    }

    /// Check every invariant that ties the mirror to the backreference table.
    ///
    /// Includes the mirror's own structural checks. An empty result means the
    /// mirror holds exactly the edges of the links whose owners are known.
    pub fn check_invariants(&self, mirror: &MirrorGraph) -> Vec<InvariantViolation> {
        let mut violations = mirror.check_invariants();

        for (id, link) in &self.links {
            let ports = link.ports();
            let owners = ports.map(|port| self.backrefs.owner(port));

            if mirror.is_materialized(id) {
                let edges = mirror.link_edges(id);
                for (port, owner) in ports.iter().zip(owners.iter()) {
                    let Some(owner) = owner else {
                        violations.push(InvariantViolation::UnresolvedEndpoint {
                            link: id.clone(),
                            port: (*port).clone(),
                        });
                        continue;
                    };
                    let placed = edges.iter().all(|(from, to, data)| {
                        (&data.source != *port || &from.id == owner)
                            && (&data.sink != *port || &to.id == owner)
                    });
                    if !placed {
                        violations.push(InvariantViolation::MisplacedEdge {
                            link: id.clone(),
                            port: (*port).clone(),
                        });
                    }
                }
            } else if owners
                .iter()
                .all(|owner| owner.as_ref().is_some_and(|n| mirror.contains_node(n)))
            {
                violations.push(InvariantViolation::Unmaterialized { link: id.clone() });
            }
        }

        for id in mirror.links() {
            if !self.links.contains_key(id) {
                violations.push(InvariantViolation::UntrackedEdge { link: id.clone() });
            }
        }

        violations
    }
}
