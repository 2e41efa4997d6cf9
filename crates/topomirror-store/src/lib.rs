//! topomirror store - contract with the remote topology store
//!
//! The mirror only needs three things from the store that owns the topology:
//! - Bulk load of each collection (nodes, ports, links)
//! - Insert (create or update) and removal of single entities
//! - A subscription delivering "created" and "updated" notifications
//!
//! [`TopologyStore`] captures that contract. [`MemoryStore`] implements it in
//! process and is what the CLI and the tests run against; it can be seeded
//! from, and saved to, a JSON [`TopologySnapshot`] file.
//!
//! ## Example
//!
//! ```ignore
//! use topomirror_store::{Entity, MemoryStore, TopologyStore};
//! use topomirror_core::Node;
//!
//! let store = MemoryStore::new();
//! let mut events = store.subscribe();
//! store.insert(Entity::Node(Node::new("switch-1")), true).await?;
//! let event = events.recv().await;
//! ```

mod error;
mod memory;
mod snapshot;
mod traits;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::TopologySnapshot;
pub use traits::TopologyStore;
pub use types::{Collection, Entity, StoreEvent};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
