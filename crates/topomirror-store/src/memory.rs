//! In-process topology store.
//!
//! Keeps every collection in memory and fans change notifications out to all
//! subscribers. Used as the store behind the CLI and in tests, where it can
//! also be switched offline to exercise failure paths.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::snapshot::TopologySnapshot;
use crate::traits::TopologyStore;
use crate::types::{Collection, Entity, StoreEvent};

/// Topology store held entirely in memory.
///
/// Writes are applied and broadcast under the same lock, so notifications for
/// one entity always reach subscribers in write order. Nothing here awaits,
/// which makes the trait methods complete immediately.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Committed entities per collection, ordered by id
    collections: RwLock<HashMap<Collection, BTreeMap<String, Entity>>>,

    /// Writes made with `commit = false`, flushed by `commit()`
    staged: Mutex<Vec<Entity>>,

    /// Open notification streams
    subscribers: Mutex<Vec<UnboundedSender<StoreEvent>>>,

    /// When set, every call fails with `Unavailable`
    offline: AtomicBool,

    /// Number of successful insert calls
    inserts: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot.
    ///
    /// Seeding emits no notifications.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Self {
        let store = Self::new();
        {
            let mut collections = store.collections.write();
            for entity in snapshot.into_entities() {
                collections
                    .entry(entity.collection())
                    .or_default()
                    .insert(entity.id().to_string(), entity);
            }
        }
        store
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        debug!(offline, "memory store availability changed");
    }

    /// Get a committed entity
    pub fn get(&self, collection: Collection, id: &str) -> Option<Entity> {
        self.collections
            .read()
            .get(&collection)
            .and_then(|entities| entities.get(id).cloned())
    }

    /// Number of committed entities in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Number of writes waiting for `commit()`
    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }

    /// Number of successful insert calls since creation
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store is offline"));
        }
        Ok(())
    }

    /// Store an entity and notify subscribers.
    fn write(&self, entity: Entity) {
        let mut collections = self.collections.write();
        let previous = collections
            .entry(entity.collection())
            .or_default()
            .insert(entity.id().to_string(), entity.clone());

        let event = match previous {
            Some(_) => StoreEvent::Updated(entity),
            None => StoreEvent::Created(entity),
        };
        trace!(
            collection = %event.entity().collection(),
            id = event.entity().id(),
            "committed entity"
        );

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[async_trait]
impl TopologyStore for MemoryStore {
    async fn load(&self, collection: Collection) -> Result<Vec<Entity>, StoreError> {
        self.ensure_online()?;
        let entities: Vec<Entity> = self
            .collections
            .read()
            .get(&collection)
            .map(|entities| entities.values().cloned().collect())
            .unwrap_or_default();
        debug!(%collection, count = entities.len(), "loaded collection");
        Ok(entities)
    }

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Option<Entity>, StoreError> {
        self.ensure_online()?;
        Ok(self.get(collection, id))
    }

    async fn insert(&self, entity: Entity, commit: bool) -> Result<Entity, StoreError> {
        self.ensure_online()?;
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if commit {
            self.write(entity.clone());
        } else {
            trace!(id = entity.id(), "staged entity");
            self.staged.lock().push(entity.clone());
        }
        Ok(entity)
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.staged
            .lock()
            .retain(|entity| !(entity.collection() == collection && entity.id() == id));

        let removed = self
            .collections
            .write()
            .get_mut(&collection)
            .and_then(|entities| entities.remove(id));
        match removed {
            Some(_) => {
                debug!(%collection, id, "removed entity");
                Ok(())
            }
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.ensure_online()?;
        let staged = std::mem::take(&mut *self.staged.lock());
        if !staged.is_empty() {
            debug!(count = staged.len(), "committing staged entities");
        }
        for entity in staged {
            self.write(entity);
        }
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
