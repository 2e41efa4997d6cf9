//! Shared types for store operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use topomirror_core::{Link, Node, Port};

/// One of the three entity collections the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Nodes,
    Ports,
    Links,
}

impl Collection {
    /// All collections, in the order a bulk load should apply them
    pub const ALL: [Collection; 3] = [Collection::Nodes, Collection::Ports, Collection::Links];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Nodes => "nodes",
            Collection::Ports => "ports",
            Collection::Links => "links",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored entity of any collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", content = "entity", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Port(Port),
    Link(Link),
}

impl Entity {
    /// Identifier within its collection
    pub fn id(&self) -> &str {
        match self {
            Entity::Node(node) => node.id.as_str(),
            Entity::Port(port) => port.id.as_str(),
            Entity::Link(link) => link.id.as_str(),
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Entity::Node(_) => Collection::Nodes,
            Entity::Port(_) => Collection::Ports,
            Entity::Link(_) => Collection::Links,
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<Port> for Entity {
    fn from(port: Port) -> Self {
        Entity::Port(port)
    }
}

impl From<Link> for Entity {
    fn from(link: Link) -> Self {
        Entity::Link(link)
    }
}

/// Change notification delivered to subscribers.
///
/// Notifications for one entity arrive in the order its versions were
/// written. Nothing is promised across different entities.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Entity did not exist before this write
    Created(Entity),
    /// Entity replaced an existing version
    Updated(Entity),
}

impl StoreEvent {
    /// The entity carried by the notification
    pub fn entity(&self) -> &Entity {
        match self {
            StoreEvent::Created(entity) | StoreEvent::Updated(entity) => entity,
        }
    }

    pub fn into_entity(self) -> Entity {
        match self {
            StoreEvent::Created(entity) | StoreEvent::Updated(entity) => entity,
        }
    }
}
