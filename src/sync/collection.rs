use super::{ScopeFilter, SelfActionTracker, SyncConfig};
use crate::backend::PersistenceClient;
use crate::core::{Entity, Result, SyncError};
use crate::storage::{EntityStore, StoreSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{Level, event};

pub(crate) struct CollectionState<E: Entity> {
    pub(crate) store: EntityStore<E>,
    pub(crate) tracker: SelfActionTracker,
    pub(crate) live: bool,
    pub(crate) reloads: u64,
}

/// State owned by one mounted view: the entity store, the self-action
/// tracker and the liveness flag.
///
/// Cheap to clone; the Optimistic Mutator and the Reconciler each hold a
/// handle. The lock is only ever held for one synchronous step, never across
/// an await, so readers always see either the pre- or post-mutation state.
pub struct SyncedCollection<E: Entity> {
    inner: Arc<Mutex<CollectionState<E>>>,
    config: Arc<SyncConfig>,
}

impl<E: Entity> Clone for SyncedCollection<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: Entity> SyncedCollection<E> {
    pub fn new(config: SyncConfig) -> Self {
        let tracker = SelfActionTracker::from_config(&config);
        Self {
            inner: Arc::new(Mutex::new(CollectionState {
                store: EntityStore::new(),
                tracker,
                live: true,
                reloads: 0,
            })),
            config: Arc::new(config),
        }
    }

    // A panic elsewhere never leaves the store half-written (every step is a
    // single store call), so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, CollectionState<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut CollectionState<E>) -> T) -> T {
        let mut state = self.lock();
        f(&mut state)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn snapshot(&self) -> StoreSnapshot<E> {
        self.lock().store.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.lock().store.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().store.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().store.is_empty()
    }

    pub fn is_live(&self) -> bool {
        self.lock().live
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.lock().tracker.is_tracked(id)
    }

    pub fn tracked_count(&self) -> usize {
        self.lock().tracker.len()
    }

    /// Number of full reloads applied since creation.
    pub fn reload_count(&self) -> u64 {
        self.lock().reloads
    }

    /// Overwrites the store with a freshly listed collection.
    pub fn replace_all(&self, entities: Vec<E>) -> Result<()> {
        let mut state = self.lock();
        if !state.live {
            return Err(SyncError::Unmounted);
        }
        state.store.replace_all(entities);
        state.reloads += 1;
        Ok(())
    }

    /// Full-reload recovery path: lists the scope from the backend and
    /// overwrites the store with the result.
    pub async fn reload_from<P>(&self, client: &P, scope: &ScopeFilter) -> Result<()>
    where
        P: PersistenceClient<E> + ?Sized,
    {
        if !self.is_live() {
            return Err(SyncError::Unmounted);
        }
        let entities = client.list(scope).await.map_err(SyncError::Reload)?;
        let count = entities.len();
        self.replace_all(entities)?;
        event!(Level::DEBUG, kind = E::KIND, count, "collection reloaded");
        Ok(())
    }

    /// Marks the collection dead; later completions and events become no-ops.
    pub(crate) fn close(&self) {
        self.lock().live = false;
    }
}

/// Locally known parent ids, used to scope child entity events.
pub trait ParentIndex: Send + Sync {
    fn contains_parent(&self, id: &str) -> bool;
}

impl<E: Entity> ParentIndex for SyncedCollection<E> {
    /// An unmounted parent view no longer vouches for anything.
    fn contains_parent(&self, id: &str) -> bool {
        let state = self.lock();
        state.live && state.store.contains(id)
    }
}

impl ParentIndex for HashSet<String> {
    fn contains_parent(&self, id: &str) -> bool {
        self.contains(id)
    }
}
