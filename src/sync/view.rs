use super::{
    ChangeChannel, Notifier, OptimisticMutator, ParentIndex, Reconciler, ScopeFilter,
    Subscription, SyncConfig, SyncedCollection,
};
use crate::backend::PersistenceClient;
use crate::core::{Entity, Result, StatusEntity, SyncError};
use crate::storage::StoreSnapshot;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{Level, event};

/// One mounted view of an entity kind: its store, the mutation entry points
/// and the live change subscription.
///
/// The store lives exactly as long as the mount. After `unmount` (or drop)
/// late persistence completions and change events leave it untouched.
pub struct SyncView<E: Entity, P: ?Sized, N: ?Sized> {
    collection: SyncedCollection<E>,
    mutator: OptimisticMutator<E, P>,
    reconciler: Arc<Reconciler<E, N>>,
    client: Arc<P>,
    scope: ScopeFilter,
    subscription: Option<Subscription>,
}

pub struct SyncViewBuilder<E: Entity, P: ?Sized, N: ?Sized> {
    client: Arc<P>,
    notifier: Arc<N>,
    config: SyncConfig,
    scope: ScopeFilter,
    parents: Option<Arc<dyn ParentIndex>>,
    marker: PhantomData<fn() -> E>,
}

impl<E, P, N> SyncViewBuilder<E, P, N>
where
    E: Entity,
    P: PersistenceClient<E> + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = scope;
        self
    }

    /// Restricts child events to parents known to `parents` (typically the
    /// collection of a mounted parent view).
    pub fn parents(mut self, parents: Arc<dyn ParentIndex>) -> Self {
        self.parents = Some(parents);
        self
    }

    /// Subscribes, loads the full list, then starts applying events.
    ///
    /// Subscribing before the load means nothing committed in between is
    /// missed; events already contained in the list apply as no-ops.
    pub async fn mount<C>(self, channel: &C) -> Result<SyncView<E, P, N>>
    where
        C: ChangeChannel<E> + ?Sized,
    {
        let collection = SyncedCollection::new(self.config);
        let receiver = channel.subscribe();
        collection
            .reload_from(self.client.as_ref(), &self.scope)
            .await?;

        let mut reconciler = Reconciler::new(collection.clone(), self.notifier);
        if let Some(parents) = self.parents {
            reconciler = reconciler.with_parents(parents);
        }
        let reconciler = Arc::new(reconciler);
        let subscription = Subscription::spawn(
            receiver,
            reconciler.clone(),
            self.client.clone(),
            self.scope.clone(),
        );
        let mutator =
            OptimisticMutator::new(collection.clone(), self.client.clone(), self.scope.clone());

        event!(
            Level::INFO,
            kind = E::KIND,
            count = collection.len(),
            "view mounted"
        );
        Ok(SyncView {
            collection,
            mutator,
            reconciler,
            client: self.client,
            scope: self.scope,
            subscription: Some(subscription),
        })
    }
}

impl<E, P, N> SyncView<E, P, N>
where
    E: Entity,
    P: PersistenceClient<E> + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    pub fn builder(client: Arc<P>, notifier: Arc<N>) -> SyncViewBuilder<E, P, N> {
        SyncViewBuilder {
            client,
            notifier,
            config: SyncConfig::default(),
            scope: ScopeFilter::All,
            parents: None,
            marker: PhantomData,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot<E> {
        self.collection.snapshot()
    }

    pub fn collection(&self) -> &SyncedCollection<E> {
        &self.collection
    }

    pub fn mutator(&self) -> &OptimisticMutator<E, P> {
        &self.mutator
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<E, N>> {
        &self.reconciler
    }

    pub fn is_mounted(&self) -> bool {
        self.collection.is_live()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    pub async fn create(&self, draft: E::Draft) -> Result<E> {
        self.mutator.create(draft).await
    }

    pub async fn update(&self, id: &str, patch: E::Patch) -> Result<E> {
        self.mutator.update(id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.mutator.delete(id).await
    }

    /// Full reload from the backend; always safe.
    pub async fn reload(&self) -> Result<()> {
        self.collection
            .reload_from(self.client.as_ref(), &self.scope)
            .await
    }

    /// Replaces the subscription (e.g. after a reconnect) and reloads, since
    /// events may have been missed while disconnected.
    pub async fn resubscribe<C>(&mut self, channel: &C) -> Result<()>
    where
        C: ChangeChannel<E> + ?Sized,
    {
        if !self.is_mounted() {
            return Err(SyncError::Unmounted);
        }
        if let Some(old) = self.subscription.take() {
            old.unsubscribe();
        }
        let receiver = channel.subscribe();
        self.reload().await?;
        self.subscription = Some(Subscription::spawn(
            receiver,
            self.reconciler.clone(),
            self.client.clone(),
            self.scope.clone(),
        ));
        event!(Level::INFO, kind = E::KIND, "view resubscribed");
        Ok(())
    }

    pub fn unmount(mut self) {
        self.shutdown();
    }
}

impl<E, P, N> SyncView<E, P, N>
where
    E: StatusEntity,
    P: PersistenceClient<E> + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    pub async fn cycle_status(&self, id: &str) -> Result<E> {
        self.mutator.cycle_status(id).await
    }
}

impl<E: Entity, P: ?Sized, N: ?Sized> SyncView<E, P, N> {
    fn shutdown(&mut self) {
        if !self.collection.is_live() && self.subscription.is_none() {
            return;
        }
        self.collection.close();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        event!(Level::INFO, kind = E::KIND, "view unmounted");
    }
}

impl<E: Entity, P: ?Sized, N: ?Sized> Drop for SyncView<E, P, N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
