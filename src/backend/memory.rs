use super::PersistenceClient;
use crate::core::{Entity, PersistResult, PersistenceError};
use crate::storage::EntityStore;
use crate::sync::{ChangeChannel, ChangeEnvelope, ChangeEvent, ScopeFilter, SyncConfig};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{Level, event};

/// Process-local backing store that is also the change channel.
///
/// Every committed write is broadcast to all subscribers, including the
/// client that made it. Several views mounted on one backend behave like
/// several browser tabs on one database. Failures, latency and echo delivery
/// can be controlled for simulations and tests.
pub struct InMemoryBackend<E: Entity> {
    records: Mutex<EntityStore<E>>,
    changes: broadcast::Sender<ChangeEnvelope<E>>,
    next_id: AtomicU64,
    pending_failures: AtomicUsize,
    latency: Duration,
    holding: AtomicBool,
    held: Mutex<Vec<ChangeEnvelope<E>>>,
}

impl<E: Entity> InMemoryBackend<E> {
    pub fn new(channel_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            records: Mutex::new(EntityStore::new()),
            changes,
            next_id: AtomicU64::new(1),
            pending_failures: AtomicUsize::new(0),
            latency: Duration::ZERO,
            holding: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    /// Delay every call by `latency` before it touches the records.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Preloads records without announcing them.
    pub fn seed(&self, entities: impl IntoIterator<Item = E>) {
        let mut records = self.records();
        for entity in entities {
            records.upsert(entity);
        }
    }

    /// Rejects the next `count` create/update/delete calls.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Buffers change events instead of broadcasting them.
    pub fn hold_changes(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Broadcasts everything buffered since `hold_changes`, in commit order,
    /// and resumes live delivery.
    pub fn release_changes(&self) -> usize {
        self.holding.store(false, Ordering::SeqCst);
        let held: Vec<_> = std::mem::take(
            &mut *self.held.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let count = held.len();
        for envelope in held {
            let _ = self.changes.send(envelope);
        }
        count
    }

    /// Drops everything buffered since `hold_changes` (lost echoes).
    pub fn discard_held_changes(&self) -> usize {
        self.holding.store(false, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let count = held.len();
        held.clear();
        count
    }

    /// Injects a raw change event, as if another backend writer committed it.
    /// The records are left as they are.
    pub fn publish(&self, change: ChangeEvent<E>) {
        self.announce(change);
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.records().get(id).cloned()
    }

    pub fn all(&self) -> Vec<E> {
        self.records().snapshot().to_vec()
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn records(&self) -> MutexGuard<'_, EntityStore<E>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> PersistResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PersistenceError::new("injected backend failure"));
        }
        Ok(())
    }

    fn announce(&self, change: ChangeEvent<E>) {
        let envelope = ChangeEnvelope::new(change);
        if self.holding.load(Ordering::SeqCst) {
            self.held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(envelope);
            return;
        }
        // no subscribers is fine
        let _ = self.changes.send(envelope);
    }
}

impl<E: Entity> ChangeChannel<E> for InMemoryBackend<E> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope<E>> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl<E: Entity> PersistenceClient<E> for InMemoryBackend<E> {
    async fn create(&self, draft: &E::Draft) -> PersistResult<E> {
        self.round_trip().await?;
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let entity = E::from_draft(id, draft, Utc::now());
        self.records().upsert(entity.clone());
        event!(Level::DEBUG, kind = E::KIND, id = %entity.id(), "backend insert");
        self.announce(ChangeEvent::Insert {
            entity: entity.clone(),
        });
        Ok(entity)
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> PersistResult<()> {
        self.round_trip().await?;
        let updated = {
            let mut records = self.records();
            let Some(mut entity) = records.get(id).cloned() else {
                return Err(PersistenceError::new(format!(
                    "{} '{}' does not exist",
                    E::KIND,
                    id
                )));
            };
            entity.apply_patch(patch, Utc::now());
            records.upsert(entity.clone());
            entity
        };
        event!(Level::DEBUG, kind = E::KIND, id = %id, "backend update");
        self.announce(ChangeEvent::Update { entity: updated });
        Ok(())
    }

    async fn delete(&self, id: &str) -> PersistResult<()> {
        self.round_trip().await?;
        let removed = self.records().remove(id).is_some();
        if removed {
            event!(Level::DEBUG, kind = E::KIND, id = %id, "backend delete");
            self.announce(ChangeEvent::Delete { id: id.to_string() });
        }
        Ok(())
    }

    async fn list(&self, scope: &ScopeFilter) -> PersistResult<Vec<E>> {
        self.round_trip_read().await;
        Ok(self
            .records()
            .snapshot()
            .iter()
            .filter(|entity| scope.admits_entity(*entity))
            .cloned()
            .collect())
    }
}

impl<E: Entity> InMemoryBackend<E> {
    // reads are never failure-injected
    async fn round_trip_read(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}
