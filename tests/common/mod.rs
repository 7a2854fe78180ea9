//! Shared helpers for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use hearthsync::core::{PersistResult, PersistenceError};
use hearthsync::prelude::*;
use hearthsync::sync::ChangeEnvelope;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

/// Persistence client whose writes block until the test lets them through.
///
/// Reads are never gated. Writes that pass the gate either fail (when
/// `fail_next_write` was called) or go to the wrapped in-memory backend,
/// which also serves as the change channel.
pub struct GatedClient<E: Entity> {
    pub backend: InMemoryBackend<E>,
    gate: Semaphore,
    fail: AtomicBool,
}

impl<E: Entity> GatedClient<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            backend: InMemoryBackend::new(64),
            gate: Semaphore::new(0),
            fail: AtomicBool::new(false),
        })
    }

    /// Lets one pending (or future) write reach the backend.
    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_next_write(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    async fn pass_gate(&self) -> PersistResult<()> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| PersistenceError::new("gate closed"))?;
        permit.forget();
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::new("simulated network failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> PersistenceClient<E> for GatedClient<E> {
    async fn create(&self, draft: &E::Draft) -> PersistResult<E> {
        self.pass_gate().await?;
        self.backend.create(draft).await
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> PersistResult<()> {
        self.pass_gate().await?;
        self.backend.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> PersistResult<()> {
        self.pass_gate().await?;
        self.backend.delete(id).await
    }

    async fn list(&self, scope: &ScopeFilter) -> PersistResult<Vec<E>> {
        self.backend.list(scope).await
    }
}

impl<E: Entity> ChangeChannel<E> for GatedClient<E> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope<E>> {
        self.backend.subscribe()
    }
}

/// Persistence client that answers only `delay` after the backend committed,
/// so the change event usually arrives before the response.
pub struct SlowAckClient<E: Entity> {
    pub backend: Arc<InMemoryBackend<E>>,
    delay: Duration,
}

impl<E: Entity> SlowAckClient<E> {
    pub fn new(backend: Arc<InMemoryBackend<E>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { backend, delay })
    }
}

#[async_trait]
impl<E: Entity> PersistenceClient<E> for SlowAckClient<E> {
    async fn create(&self, draft: &E::Draft) -> PersistResult<E> {
        let created = self.backend.create(draft).await?;
        tokio::time::sleep(self.delay).await;
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> PersistResult<()> {
        self.backend.update(id, patch).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> PersistResult<()> {
        self.backend.delete(id).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn list(&self, scope: &ScopeFilter) -> PersistResult<Vec<E>> {
        self.backend.list(scope).await
    }
}

impl<E: Entity> ChangeChannel<E> for SlowAckClient<E> {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope<E>> {
        self.backend.subscribe()
    }
}

pub fn goal(id: &str, title: &str) -> Goal {
    Goal::from_draft(id.to_string(), &GoalDraft::new("home", title), chrono::Utc::now())
}

/// Polls `condition` until it holds, letting spawned tasks run in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}

/// Gives the subscription tasks a chance to drain their channels.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}
