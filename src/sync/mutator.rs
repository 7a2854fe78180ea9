use super::tracker::Echo;
use super::{ScopeFilter, SyncedCollection};
use crate::backend::PersistenceClient;
use crate::core::{
    Entity, MutationOp, Result, StatusEntity, SyncError, new_placeholder_id,
};
use chrono::Utc;
use log::warn;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// What a failed mutation did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rollback {
    /// The pre-mutation value is back.
    Restored,
    /// A remote write replaced the optimistic value in the meantime; it was
    /// left in place.
    Superseded,
    /// The view is gone; nothing was touched.
    Detached,
}

/// Applies local mutations to the store before the backend confirms them
/// and undoes them when the backend refuses.
///
/// Every store write happens in one synchronous step, so readers never see a
/// half-applied mutation.
pub struct OptimisticMutator<E: Entity, P: ?Sized> {
    collection: SyncedCollection<E>,
    client: Arc<P>,
    scope: ScopeFilter,
}

impl<E: Entity, P: ?Sized> Clone for OptimisticMutator<E, P> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            client: self.client.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<E, P> OptimisticMutator<E, P>
where
    E: Entity,
    P: PersistenceClient<E> + ?Sized,
{
    pub fn new(collection: SyncedCollection<E>, client: Arc<P>, scope: ScopeFilter) -> Self {
        Self {
            collection,
            client,
            scope,
        }
    }

    pub fn collection(&self) -> &SyncedCollection<E> {
        &self.collection
    }

    /// Shows a placeholder immediately, then swaps it for the canonical
    /// record once the backend answers.
    ///
    /// Returns the canonical record. On rejection the placeholder is gone
    /// and the error carries the temporary id.
    pub async fn create(&self, draft: E::Draft) -> Result<E> {
        let temp_id = new_placeholder_id();
        let span = info_span!("sync.mutate.create", kind = E::KIND, temp_id = %temp_id);
        self.create_inner(draft, temp_id).instrument(span).await
    }

    async fn create_inner(&self, draft: E::Draft, temp_id: String) -> Result<E> {
        let placeholder = E::from_draft(temp_id.clone(), &draft, Utc::now());
        let fingerprint = placeholder.create_fingerprint();
        self.collection.with_state(|state| {
            if !state.live {
                return Err(SyncError::Unmounted);
            }
            state.store.upsert(placeholder);
            state.tracker.begin_create(&temp_id, fingerprint);
            Ok(())
        })?;
        event!(Level::DEBUG, "placeholder inserted");

        match self.client.create(&draft).await {
            Ok(canonical) => {
                let applied = self.collection.with_state(|state| {
                    if !state.live {
                        return false;
                    }
                    let claimed_by = state.tracker.finish_create(&temp_id);
                    let position = state.store.remove(&temp_id).map(|(position, _)| position);
                    if claimed_by.as_deref() == Some(canonical.id()) {
                        // the echo already swapped the placeholder
                        return true;
                    }
                    // an echo or later remote update that beat the response
                    // is newer than the response; keep it
                    if !state.store.contains(canonical.id()) {
                        match position {
                            Some(position) => {
                                state.store.restore_at(position, canonical.clone());
                            }
                            None => {
                                state.store.insert_if_absent(canonical.clone());
                            }
                        }
                        state
                            .tracker
                            .expect_echo(canonical.id(), Echo::write(&canonical));
                    }
                    true
                });
                if applied {
                    event!(Level::DEBUG, id = %canonical.id(), "placeholder replaced");
                } else {
                    event!(Level::DEBUG, id = %canonical.id(), "create resolved after unmount");
                }
                Ok(canonical)
            }
            Err(source) => {
                let outcome = self.collection.with_state(|state| {
                    if !state.live {
                        return Rollback::Detached;
                    }
                    state.tracker.finish_create(&temp_id);
                    state.store.remove(&temp_id);
                    Rollback::Restored
                });
                event!(Level::INFO, error = %source, "create rejected, placeholder dropped");
                self.after_rollback(MutationOp::Create, &temp_id, outcome)
                    .await;
                Err(SyncError::Rejected {
                    op: MutationOp::Create,
                    id: temp_id,
                    source,
                })
            }
        }
    }

    /// Applies `patch` locally, then sends it. Returns the optimistic value.
    pub async fn update(&self, id: &str, patch: E::Patch) -> Result<E> {
        let span = info_span!("sync.mutate.update", kind = E::KIND, id = %id);
        self.apply_update(MutationOp::Update, id, move |_| patch)
            .instrument(span)
            .await
    }

    async fn apply_update<F>(&self, op: MutationOp, id: &str, make_patch: F) -> Result<E>
    where
        F: FnOnce(&E) -> E::Patch + Send,
    {
        let (previous, optimistic, patch) = self.collection.with_state(|state| {
            if !state.live {
                return Err(SyncError::Unmounted);
            }
            let Some(current) = state.store.get(id).cloned() else {
                return Err(SyncError::NotFound(id.to_string()));
            };
            let patch = make_patch(&current);
            let mut optimistic = current.clone();
            optimistic.apply_patch(&patch, Utc::now());
            state.store.upsert(optimistic.clone());
            state.tracker.begin(id, Echo::write(&optimistic));
            Ok((current, optimistic, patch))
        })?;
        event!(Level::DEBUG, "optimistic update applied");

        match self.client.update(id, &patch).await {
            Ok(()) => {
                self.collection.with_state(|state| {
                    if state.live {
                        state.tracker.settle(id);
                    }
                });
                event!(Level::DEBUG, "update acknowledged");
                Ok(optimistic)
            }
            Err(source) => {
                let outcome = self.collection.with_state(|state| {
                    if !state.live {
                        return Rollback::Detached;
                    }
                    state.tracker.end(id);
                    if state.store.get(id) == Some(&optimistic) {
                        state.store.upsert(previous);
                        Rollback::Restored
                    } else {
                        Rollback::Superseded
                    }
                });
                event!(Level::INFO, error = %source, "update rejected");
                self.after_rollback(op, id, outcome).await;
                Err(SyncError::Rejected {
                    op,
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Removes the record locally, then deletes it on the backend. A
    /// rejected delete puts the record back at its old position.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let span = info_span!("sync.mutate.delete", kind = E::KIND, id = %id);
        self.delete_inner(id).instrument(span).await
    }

    async fn delete_inner(&self, id: &str) -> Result<()> {
        let (position, removed) = self.collection.with_state(|state| {
            if !state.live {
                return Err(SyncError::Unmounted);
            }
            let Some(removed) = state.store.remove(id) else {
                return Err(SyncError::NotFound(id.to_string()));
            };
            state.tracker.begin(id, Echo::Removal);
            Ok(removed)
        })?;
        event!(Level::DEBUG, position, "optimistic delete applied");

        match self.client.delete(id).await {
            Ok(()) => {
                self.collection.with_state(|state| {
                    if state.live {
                        state.tracker.settle(id);
                    }
                });
                event!(Level::DEBUG, "delete acknowledged");
                Ok(())
            }
            Err(source) => {
                let outcome = self.collection.with_state(|state| {
                    if !state.live {
                        return Rollback::Detached;
                    }
                    state.tracker.end(id);
                    if state.store.contains(id) {
                        Rollback::Superseded
                    } else {
                        state.store.restore_at(position, removed);
                        Rollback::Restored
                    }
                });
                event!(Level::INFO, error = %source, "delete rejected");
                self.after_rollback(MutationOp::Delete, id, outcome).await;
                Err(SyncError::Rejected {
                    op: MutationOp::Delete,
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    async fn after_rollback(&self, op: MutationOp, id: &str, outcome: Rollback) {
        match outcome {
            Rollback::Restored => event!(Level::DEBUG, %op, "local state rolled back"),
            Rollback::Superseded => warn!(
                "{} of '{}' was rejected but a newer remote state is present; rollback skipped",
                op, id
            ),
            Rollback::Detached => {
                event!(Level::DEBUG, %op, "rejection after unmount ignored");
                return;
            }
        }

        if self.collection.config().reload_after_rollback {
            if let Err(err) = self
                .collection
                .reload_from(self.client.as_ref(), &self.scope)
                .await
            {
                warn!("reload after rejected {} of '{}' failed: {}", op, id, err);
            }
        }
    }
}

impl<E, P> OptimisticMutator<E, P>
where
    E: StatusEntity,
    P: PersistenceClient<E> + ?Sized,
{
    /// Advances the status one step (`not-started → in-progress →
    /// completed → not-started`) with update semantics.
    pub async fn cycle_status(&self, id: &str) -> Result<E> {
        let span = info_span!("sync.mutate.cycle_status", kind = E::KIND, id = %id);
        self.apply_update(MutationOp::CycleStatus, id, |current| {
            E::status_patch(current.status().next())
        })
        .instrument(span)
        .await
    }
}
