use super::notifier::{ChangeVerb, Notifier, change_message};
use super::tracker::Echo;
use super::{ChangeEvent, ConflictPolicy, ParentIndex, SyncedCollection};
use crate::core::Entity;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// What the Reconciler did with one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Applied and surfaced to the user.
    Notified,
    /// Applied silently: the echo of one of our own mutations.
    SelfSuppressed,
    /// Nothing visible changed (duplicate delivery, unknown delete).
    Unchanged,
    /// Child event whose parent is not known locally; dropped.
    OutOfScope,
    /// Older than the stored revision under `NewerRevisionWins`; dropped.
    Stale,
    /// The owning view is unmounted; dropped.
    Detached,
}

impl ReconcileOutcome {
    /// True when the event reached the store.
    pub fn applied(self) -> bool {
        matches!(self, Self::Notified | Self::SelfSuppressed | Self::Unchanged)
    }
}

/// Folds change events from every client into the local store.
///
/// Store writes are idempotent upserts and removes, so redelivered events
/// are harmless; conflicts between clients resolve by `ConflictPolicy`.
pub struct Reconciler<E: Entity, N: ?Sized> {
    collection: SyncedCollection<E>,
    notifier: Arc<N>,
    parents: Option<Arc<dyn ParentIndex>>,
    policy: ConflictPolicy,
}

impl<E, N> Reconciler<E, N>
where
    E: Entity,
    N: Notifier + ?Sized,
{
    pub fn new(collection: SyncedCollection<E>, notifier: Arc<N>) -> Self {
        let policy = collection.config().conflict_policy;
        Self {
            collection,
            notifier,
            parents: None,
            policy,
        }
    }

    /// Only apply child events whose parent id is known to `parents`.
    pub fn with_parents(mut self, parents: Arc<dyn ParentIndex>) -> Self {
        self.parents = Some(parents);
        self
    }

    pub fn collection(&self) -> &SyncedCollection<E> {
        &self.collection
    }

    pub fn apply(&self, change: ChangeEvent<E>) -> ReconcileOutcome {
        let span = info_span!(
            "sync.reconcile",
            kind = E::KIND,
            op = change.op_name(),
            id = %change.entity_id()
        );
        let _enter = span.enter();

        let (outcome, message) = match change {
            ChangeEvent::Insert { entity } => self.apply_upsert(entity, ChangeVerb::Created),
            ChangeEvent::Update { entity } => self.apply_upsert(entity, ChangeVerb::Updated),
            ChangeEvent::Delete { id } => self.apply_delete(&id),
        };

        // the store is already written; the toast is best effort
        if let Some(message) = message {
            self.notifier.notify(&message);
        }
        event!(Level::DEBUG, ?outcome, "change reconciled");
        outcome
    }

    fn apply_upsert(&self, entity: E, verb: ChangeVerb) -> (ReconcileOutcome, Option<String>) {
        if let (Some(parents), Some(parent_id)) = (&self.parents, entity.parent_id()) {
            if !parents.contains_parent(parent_id) {
                return (ReconcileOutcome::OutOfScope, None);
            }
        }

        let policy = self.policy;
        self.collection.with_state(|state| {
            if !state.live {
                return (ReconcileOutcome::Detached, None);
            }
            if policy == ConflictPolicy::NewerRevisionWins {
                let stored_revision = state
                    .store
                    .get(entity.id())
                    .and_then(|stored| stored.revision());
                if let (Some(incoming), Some(stored)) = (entity.revision(), stored_revision) {
                    if incoming < stored {
                        return (ReconcileOutcome::Stale, None);
                    }
                }
            }

            let id = entity.id().to_string();
            let message = change_message(E::KIND, entity.title(), verb);
            if verb == ChangeVerb::Created && !state.store.contains(&id) {
                let fingerprint = entity.create_fingerprint();
                if let Some(temp_id) = state.tracker.claim_create(&id, &fingerprint) {
                    // echo of a pending create: swap the placeholder in place
                    match state.store.remove(&temp_id) {
                        Some((position, _)) => state.store.restore_at(position, entity),
                        None => state.store.upsert(entity),
                    };
                    return (ReconcileOutcome::SelfSuppressed, None);
                }
            }

            let echo = Echo::write(&entity);
            let effect = state.store.upsert(entity);
            if state.tracker.consume(&id, &echo) {
                return (ReconcileOutcome::SelfSuppressed, None);
            }
            if !effect.changed() {
                return (ReconcileOutcome::Unchanged, None);
            }
            (ReconcileOutcome::Notified, Some(message))
        })
    }

    fn apply_delete(&self, id: &str) -> (ReconcileOutcome, Option<String>) {
        self.collection.with_state(|state| {
            if !state.live {
                return (ReconcileOutcome::Detached, None);
            }
            let removed = state.store.remove(id);
            if state.tracker.consume(id, &Echo::Removal) {
                return (ReconcileOutcome::SelfSuppressed, None);
            }
            match removed {
                Some((_, entity)) => (
                    ReconcileOutcome::Notified,
                    Some(change_message(E::KIND, entity.title(), ChangeVerb::Removed)),
                ),
                None => (ReconcileOutcome::Unchanged, None),
            }
        })
    }
}
