//! Lock-protected mirror state shared by the grapher and its apply loop.
//!
//! One reentrant lock guards the mirror, the event adapter and the echo
//! bookkeeping. Reads borrow the state immutably; writes borrow it mutably,
//! so a write attempted while a read window is open on the same thread is
//! refused instead of deadlocking.

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, trace};

use topomirror_core::{EventAdapter, GraphError, MirrorGraph};
use topomirror_store::{Collection, Entity, StoreEvent, TopologySnapshot};

/// Identity of a stored entity across collections.
pub(crate) type EntityKey = (Collection, String);

pub(crate) fn key_of(entity: &Entity) -> EntityKey {
    (entity.collection(), entity.id().to_string())
}

/// Most removed entities remembered; the oldest are forgotten first.
pub(crate) const TOMBSTONE_LIMIT: usize = 4096;

/// Everything the lock protects.
#[derive(Debug, Default)]
pub(crate) struct MirrorState {
    pub(crate) mirror: MirrorGraph,
    pub(crate) adapter: EventAdapter,

    /// Local writes whose store notification has not come back yet
    inflight: HashMap<EntityKey, usize>,

    /// Entities removed through this grapher; late notifications are ignored
    tombstones: HashSet<EntityKey>,
    tombstone_order: VecDeque<EntityKey>,
}

impl MirrorState {
    /// Apply a store notification.
    ///
    /// Returns false when the notification was skipped: the entity was
    /// removed locally, or a newer local write of it is still in flight.
    pub(crate) fn apply(&mut self, event: StoreEvent) -> bool {
        let entity = event.into_entity();
        let key = key_of(&entity);

        if let Some(count) = self.inflight.get_mut(&key) {
            *count -= 1;
            let newer_pending = *count > 0;
            if !newer_pending {
                self.inflight.remove(&key);
            }
            if newer_pending {
                trace!(collection = %key.0, id = %key.1, "skipping stale echo");
                return false;
            }
        }

        if self.tombstones.contains(&key) {
            trace!(collection = %key.0, id = %key.1, "ignoring event for removed entity");
            return false;
        }

        self.apply_entity(entity);
        true
    }

    /// Apply a full snapshot: nodes first, then links.
    pub(crate) fn load_snapshot(&mut self, snapshot: TopologySnapshot) {
        let (nodes, links) = (snapshot.nodes.len(), snapshot.links.len());
        for node in snapshot.nodes {
            self.apply_entity(Entity::Node(node));
        }
        for link in snapshot.links {
            self.apply_entity(Entity::Link(link));
        }
        info!(
            nodes,
            links,
            materialized = self.mirror.link_count(),
            "loaded topology into mirror"
        );
    }

    /// Feed an entity straight into the adapter.
    pub(crate) fn apply_entity(&mut self, entity: Entity) {
        match entity {
            Entity::Node(node) => {
                self.adapter.apply_node(&mut self.mirror, node);
            }
            Entity::Link(link) => {
                self.adapter.apply_link(&mut self.mirror, link);
            }
            // ownership comes from node port lists only
            Entity::Port(port) => trace!(port = %port.id, "port event ignored"),
        }
    }

    pub(crate) fn expect_echo(&mut self, keys: &[EntityKey]) {
        for key in keys {
            *self.inflight.entry(key.clone()).or_default() += 1;
        }
    }

    pub(crate) fn cancel_echo(&mut self, keys: &[EntityKey]) {
        for key in keys {
            if let Some(count) = self.inflight.get_mut(key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.inflight.remove(key);
                }
            }
        }
    }

    pub(crate) fn tombstone(&mut self, keys: &[EntityKey]) {
        for key in keys {
            if self.tombstones.insert(key.clone()) {
                self.tombstone_order.push_back(key.clone());
            }
        }
        while self.tombstone_order.len() > TOMBSTONE_LIMIT {
            if let Some(oldest) = self.tombstone_order.pop_front() {
                self.tombstones.remove(&oldest);
            }
        }
    }

    pub(crate) fn revive(&mut self, keys: &[EntityKey]) {
        for key in keys {
            self.tombstones.remove(key);
        }
        self.tombstone_order.retain(|key| self.tombstones.contains(key));
    }
}

/// The single shared lock around [`MirrorState`].
#[derive(Debug, Default)]
pub(crate) struct SharedMirror {
    state: ReentrantMutex<RefCell<MirrorState>>,
}

impl SharedMirror {
    pub(crate) fn from_state(state: MirrorState) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(state)),
        }
    }

    /// Run `f` with shared access to the state.
    ///
    /// The lock is released when `f` returns or unwinds.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&MirrorState) -> R) -> R {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state)
    }

    /// Run `f` with exclusive access to the state.
    ///
    /// Fails with `OperationProhibited` if this thread already has the state
    /// borrowed, i.e. the call comes from inside a read window.
    pub(crate) fn write<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut MirrorState) -> R,
    ) -> Result<R, GraphError> {
        let guard = self.state.lock();
        let Ok(mut state) = guard.try_borrow_mut() else {
            debug!(operation, "structural change refused inside read window");
            return Err(GraphError::prohibited(operation));
        };
        Ok(f(&mut state))
    }
}
