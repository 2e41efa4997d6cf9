//! topomirror core - in-memory mirror of a remote topology store
//!
//! This crate holds the pieces that keep a local directed multigraph consistent
//! with a stream of Node/Port/Link events:
//! - Topology data model (nodes, ports, links and their identifiers)
//! - Backreference table mapping ports to their owning node and pending link
//! - Mirror graph store built on `petgraph::StableGraph`
//! - Event adapter that resolves links whose endpoints arrive out of order
//! - Shortest-path helpers for analysis over the mirror

pub mod adapter;
pub mod analysis;
pub mod backref;
pub mod error;
pub mod mirror;
pub mod model;

pub use adapter::EventAdapter;
pub use backref::{BackrefTable, PortRef};
pub use error::GraphError;
pub use mirror::{EdgeData, InvariantViolation, MirrorGraph};
pub use model::{Endpoints, Link, LinkId, Node, NodeId, Port, PortId, Properties};

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, GraphError>;
