//! topomirror grapher - public graph API over the live topology mirror
//!
//! [`Grapher`] owns the mirror graph and is the write surface for
//! application code:
//! - `add_node` / `remove_node`, idempotent by node name
//! - `add_edge` / `remove_edge`, allocating and retiring ports as needed
//! - `add_weight`, attaching a link property to edges for weighted algorithms
//! - `with_graph`, a scoped read window over the mirror
//!
//! ## Modes
//!
//! - **live**: changes are written to the topology store first and reach the
//!   mirror only after the store accepted them; store notifications are
//!   applied continuously by a background task.
//! - **static**: the mirror is built once from a snapshot; changes are local.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use topomirror_grapher::Grapher;
//! use topomirror_store::MemoryStore;
//!
//! let grapher = Grapher::live(Arc::new(MemoryStore::new())).await?;
//! let a = grapher.add_node("sw1").await?;
//! let b = grapher.add_node("sw2").await?;
//! grapher.add_edge(&a, &b, false, Default::default()).await?;
//!
//! let hops = grapher.with_graph(|g| g.shortest_paths_from(&a));
//! ```
//!
//! The yielded graph is read-only; structural calls on it do not compile:
//!
//! ```compile_fail
//! let grapher = topomirror_grapher::Grapher::new_static();
//! grapher.with_graph(|g| g.add_vertex(topomirror_core::Node::new("x")));
//! ```

mod error;
mod grapher;
mod shared;

pub use error::GrapherError;
pub use grapher::{Grapher, MirrorStats};

pub use topomirror_config::GraphMode;

/// Result type for grapher operations.
pub type Result<T> = std::result::Result<T, GrapherError>;
