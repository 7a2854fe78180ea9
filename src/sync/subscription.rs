use super::{ChangeEnvelope, Notifier, ReconcileOutcome, Reconciler, ScopeFilter};
use crate::backend::PersistenceClient;
use crate::core::{Entity, SyncError};
use log::warn;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{Level, event};

/// Live feed from a change channel into one Reconciler.
///
/// Dropping the handle (or calling `unsubscribe`) stops delivery; nothing is
/// applied to the store afterwards.
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Starts feeding `receiver` into `reconciler` on the current tokio
    /// runtime.
    ///
    /// Events outside `scope` are skipped. When the receiver lags (events
    /// were lost) the collection is fully reloaded through `client`.
    pub fn spawn<E, N, P>(
        receiver: broadcast::Receiver<ChangeEnvelope<E>>,
        reconciler: Arc<Reconciler<E, N>>,
        client: Arc<P>,
        scope: ScopeFilter,
    ) -> Self
    where
        E: Entity,
        N: Notifier + ?Sized + 'static,
        P: PersistenceClient<E> + ?Sized + 'static,
    {
        let task = tokio::spawn(pump(receiver, reconciler, client, scope));
        Self { task: Some(task) }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump<E, N, P>(
    mut receiver: broadcast::Receiver<ChangeEnvelope<E>>,
    reconciler: Arc<Reconciler<E, N>>,
    client: Arc<P>,
    scope: ScopeFilter,
) where
    E: Entity,
    N: Notifier + ?Sized,
    P: PersistenceClient<E> + ?Sized,
{
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if !scope.admits(&envelope.event) {
                    continue;
                }
                if reconciler.apply(envelope.event) == ReconcileOutcome::Detached {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(
                    "{} change stream lagged by {} events; reloading",
                    E::KIND,
                    missed
                );
                match reconciler
                    .collection()
                    .reload_from(client.as_ref(), &scope)
                    .await
                {
                    Ok(()) => {}
                    Err(SyncError::Unmounted) => break,
                    Err(err) => warn!("{} reload after lag failed: {}", E::KIND, err),
                }
            }
            Err(RecvError::Closed) => {
                event!(Level::DEBUG, kind = E::KIND, "change channel closed");
                break;
            }
        }
    }
}
