//! Store trait definition.
//!
//! Defines the async interface the mirror consumes from a topology store.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::StoreError;
use crate::snapshot::TopologySnapshot;
use crate::types::{Collection, Entity, StoreEvent};

/// Remote topology store.
///
/// Implemented by anything that owns the authoritative topology: the
/// in-process [`MemoryStore`](crate::MemoryStore) or a network client.
/// Transport concerns (retries, timeouts, cancellation) belong to the
/// implementation, not to callers.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// Load every current entity of a collection.
    async fn load(&self, collection: Collection) -> Result<Vec<Entity>, StoreError>;

    /// Fetch one entity by id, `None` if the store does not hold it.
    ///
    /// The default scans the whole collection; implementations with keyed
    /// access should override it.
    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .load(collection)
            .await?
            .into_iter()
            .find(|entity| entity.id() == id))
    }

    /// Create or update an entity.
    ///
    /// # Arguments
    /// * `entity` - The entity to write; its id decides create vs update
    /// * `commit` - Make the write durable and visible before returning.
    ///   Without it the write is staged until [`commit`](Self::commit).
    ///
    /// # Returns
    /// The entity as stored.
    async fn insert(&self, entity: Entity, commit: bool) -> Result<Entity, StoreError>;

    /// Delete an entity.
    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Flush staged writes.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Open a notification stream.
    ///
    /// Only writes made after the call are delivered.
    fn subscribe(&self) -> UnboundedReceiver<StoreEvent>;

    /// Load all three collections at once.
    async fn snapshot(&self) -> Result<TopologySnapshot, StoreError> {
        let mut snapshot = TopologySnapshot::default();
        for collection in Collection::ALL {
            for entity in self.load(collection).await? {
                snapshot.push(entity);
            }
        }
        Ok(snapshot)
    }
}
