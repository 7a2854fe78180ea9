use super::ProgressStatus;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use uuid::Uuid;

/// Prefix marking ids minted locally for optimistic placeholders.
///
/// Server-issued ids never start with it, so a placeholder can always be told
/// apart from a canonical record.
pub const PLACEHOLDER_ID_PREFIX: &str = "tmp-";

pub fn new_placeholder_id() -> String {
    format!("{PLACEHOLDER_ID_PREFIX}{}", Uuid::new_v4())
}

pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_ID_PREFIX)
}

/// A shared record kept in sync between the local view and the backend.
///
/// Updates are whole-entity replacements: applying a `Patch` locally yields
/// the full value the backend will echo back, so the store never has to
/// merge fields.
pub trait Entity: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// User-supplied fields for a create call.
    type Draft: Clone + Debug + Send + Sync + 'static;
    /// Partial update sent to the backend.
    type Patch: Clone + Debug + Send + Sync + 'static;

    /// Human label used in notifications ("Goal", "Event", ...).
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn title(&self) -> &str;

    /// Id of the owning parent record, for child kinds such as milestones.
    fn parent_id(&self) -> Option<&str> {
        None
    }

    /// Space (household) the record belongs to, if the kind is space-scoped.
    fn space_id(&self) -> Option<&str> {
        None
    }

    /// Last-modified marker compared by `ConflictPolicy::NewerRevisionWins`.
    fn revision(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Materializes a record from a draft with safe defaults for every field
    /// the user did not supply.
    fn from_draft(id: String, draft: &Self::Draft, now: DateTime<Utc>) -> Self;

    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);

    /// Content an echo must carry to be recognized as the echo of a local
    /// write. Kinds that stamp a modification time should leave it out,
    /// since the backend stamps its own.
    fn content_fingerprint(&self) -> String {
        format!("{self:?}")
    }

    /// Matches a create echo to its placeholder before the canonical id is
    /// known.
    fn create_fingerprint(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.space_id().unwrap_or_default(),
            self.parent_id().unwrap_or_default(),
            self.title()
        )
    }
}

/// Entities whose progress can be cycled from a single checkbox.
pub trait StatusEntity: Entity {
    fn status(&self) -> ProgressStatus;

    fn status_patch(status: ProgressStatus) -> Self::Patch;
}
