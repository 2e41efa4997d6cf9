//! Topology data model.
//!
//! Nodes own an ordered list of port references. Links join exactly two ports,
//! either as an ordered (source, sink) pair or as an unordered pair. Ports never
//! point back at their node; that relation lives in the backreference table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Arbitrary property bag carried by links.
pub type Properties = Map<String, Value>;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Allocate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identity of a topology node.
    NodeId
);
entity_id!(
    /// Identity of a port.
    PortId
);
entity_id!(
    /// Identity of a link. Stable across updates, even when endpoints change.
    LinkId
);

// ============================================================================
// Entities
// ============================================================================

/// A topology node (switch, host, router...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identity
    pub id: NodeId,

    /// Display name
    pub name: String,

    /// Ports owned by this node, in declaration order
    #[serde(default)]
    pub ports: Vec<PortId>,
}

impl Node {
    /// Create a node with a fresh identity and no ports.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(NodeId::generate(), name)
    }

    /// Create a node with a known identity.
    pub fn with_id(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ports: Vec::new(),
        }
    }

    /// Append a port reference.
    pub fn with_port(mut self, port: impl Into<PortId>) -> Self {
        self.ports.push(port.into());
        self
    }

    /// Check whether this node lists the port
    pub fn owns(&self, port: &PortId) -> bool {
        self.ports.contains(port)
    }
}

/// An attachment point for links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Port {
    /// Create an anonymous port with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: PortId::generate(),
            name: None,
        }
    }

    /// Create a port with a known identity.
    pub fn with_id(id: impl Into<PortId>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

impl Default for Port {
    fn default() -> Self {
        Self::new()
    }
}

/// The two ports a link joins.
///
/// Serialized the way the topology store encodes them: an object with
/// `source`/`sink` for directed links, a two-element array otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoints {
    /// Ordered pair
    Directed { source: PortId, sink: PortId },
    /// Unordered pair; element order is only used to pick the canonical pair
    Undirected([PortId; 2]),
}

impl Endpoints {
    /// Canonical port pair: (source, sink) or (first, second).
    pub fn pair(&self) -> [&PortId; 2] {
        match self {
            Endpoints::Directed { source, sink } => [source, sink],
            Endpoints::Undirected([a, b]) => [a, b],
        }
    }

    pub fn is_directed(&self) -> bool {
        matches!(self, Endpoints::Directed { .. })
    }

    /// Check whether either endpoint is the given port
    pub fn touches(&self, port: &PortId) -> bool {
        self.pair().contains(&port)
    }
}

/// A connection between two ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Link identity
    pub id: LinkId,

    /// Joined ports; directedness is carried by the variant
    pub endpoints: Endpoints,

    /// Free-form attributes (capacity, latency, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Properties,
}

impl Link {
    /// Create a directed link with a fresh identity.
    pub fn directed(source: impl Into<PortId>, sink: impl Into<PortId>) -> Self {
        Self {
            id: LinkId::generate(),
            endpoints: Endpoints::Directed {
                source: source.into(),
                sink: sink.into(),
            },
            properties: Properties::new(),
        }
    }

    /// Create an undirected link with a fresh identity.
    pub fn undirected(a: impl Into<PortId>, b: impl Into<PortId>) -> Self {
        Self {
            id: LinkId::generate(),
            endpoints: Endpoints::Undirected([a.into(), b.into()]),
            properties: Properties::new(),
        }
    }

    /// Replace the identity.
    pub fn with_id(mut self, id: impl Into<LinkId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn is_directed(&self) -> bool {
        self.endpoints.is_directed()
    }

    /// Canonical port pair, see [`Endpoints::pair`].
    pub fn ports(&self) -> [&PortId; 2] {
        self.endpoints.pair()
    }

    /// Get a property by name
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}
