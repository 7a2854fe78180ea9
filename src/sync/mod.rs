//! Collaborative state reconciliation.
//!
//! A mounted [`SyncView`] owns a [`SyncedCollection`] (entity store, self
//! action tracker, liveness flag). Two writers share it:
//!
//! - [`OptimisticMutator`]: local create/update/delete, applied before the
//!   backend answers and rolled back if it refuses;
//! - [`Reconciler`]: every committed write from any client, pushed by a
//!   [`ChangeChannel`] and fed in by a [`Subscription`].
//!
//! Both go through the same idempotent upsert/remove primitives, so echoes of
//! local writes and redelivered events settle to the same state.

pub mod collection;
pub mod config;
pub mod event;
pub mod mutator;
pub mod notifier;
pub mod reconciler;
pub mod subscription;
pub mod tracker;
pub mod view;

pub use collection::{ParentIndex, SyncedCollection};
pub use config::{ConflictPolicy, SyncConfig};
pub use event::{ChangeChannel, ChangeEnvelope, ChangeEvent, ScopeFilter};
pub use mutator::OptimisticMutator;
pub use notifier::{ChangeVerb, LogNotifier, MemoryNotifier, Notifier, change_message};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use subscription::Subscription;
pub use tracker::{Echo, SelfActionTracker};
pub use view::{SyncView, SyncViewBuilder};
