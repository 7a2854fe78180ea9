//! Everything a view layer usually needs, in one import.
//!
//! ```
//! use hearthsync::prelude::*;
//! ```

pub use crate::backend::{InMemoryBackend, PersistenceClient};
pub use crate::core::{Entity, ProgressStatus, Result, StatusEntity, SyncError};
pub use crate::domain::{
    CalendarEvent, CalendarEventDraft, CalendarEventPatch, Goal, GoalDraft, GoalPatch, Milestone,
    MilestoneDraft, MilestonePatch,
};
pub use crate::sync::{
    ChangeChannel, ChangeEvent, ConflictPolicy, LogNotifier, MemoryNotifier, Notifier,
    ScopeFilter, SyncConfig, SyncView,
};
