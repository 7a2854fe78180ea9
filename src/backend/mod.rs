//! Backing-store side of the engine.
//!
//! `PersistenceClient` is the only way the engine writes to the shared
//! store; `memory` provides a process-local implementation that doubles as
//! the change channel.

pub mod memory;

pub use memory::InMemoryBackend;

use crate::core::{Entity, PersistResult};
use crate::sync::ScopeFilter;
use async_trait::async_trait;

/// Create/update/delete/list against the backing store.
///
/// Any `Err` is treated as an opaque rejection by the engine.
#[async_trait]
pub trait PersistenceClient<E: Entity>: Send + Sync {
    /// Persists a new record and returns it with its canonical id.
    async fn create(&self, draft: &E::Draft) -> PersistResult<E>;

    async fn update(&self, id: &str, patch: &E::Patch) -> PersistResult<()>;

    async fn delete(&self, id: &str) -> PersistResult<()>;

    /// Full list used for the initial load and every reload.
    async fn list(&self, scope: &ScopeFilter) -> PersistResult<Vec<E>>;
}
