// ============================================================================
// HearthSync Library
// ============================================================================

//! Optimistic local state and real-time reconciliation for entities shared
//! by several clients of one household space (calendar events, goals,
//! milestones).
//!
//! # Examples
//!
//! ```
//! use hearthsync::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
//! let notifier = Arc::new(MemoryNotifier::new());
//!
//! let view = SyncView::<Goal, _, _>::builder(backend.clone(), notifier)
//!     .scope(ScopeFilter::Space("home".into()))
//!     .mount(backend.as_ref())
//!     .await?;
//!
//! let goal = view.create(GoalDraft::new("home", "Emergency fund")).await?;
//! view.cycle_status(&goal.id).await?;
//!
//! assert_eq!(view.snapshot().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod core;
pub mod domain;
pub mod prelude;
pub mod storage;
pub mod sync;

// Re-export main types for convenience
pub use backend::{InMemoryBackend, PersistenceClient};
pub use core::{
    Entity, MutationOp, PersistResult, PersistenceError, ProgressStatus, Result, StatusEntity,
    SyncError,
};
pub use storage::{EntityStore, StoreSnapshot, UpsertEffect};
pub use sync::{
    ChangeChannel, ChangeEnvelope, ChangeEvent, ConflictPolicy, LogNotifier, MemoryNotifier,
    Notifier, OptimisticMutator, ReconcileOutcome, Reconciler, ScopeFilter, SelfActionTracker,
    SyncConfig, SyncView, SyncedCollection,
};
