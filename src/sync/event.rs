use crate::core::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Committed write announced by the change channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeEvent<E> {
    Insert { entity: E },
    Update { entity: E },
    Delete { id: String },
}

impl<E: Entity> ChangeEvent<E> {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Insert { entity } | Self::Update { entity } => entity.id(),
            Self::Delete { id } => id,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A `ChangeEvent` plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEnvelope<E> {
    pub event: ChangeEvent<E>,
    pub committed_at: DateTime<Utc>,
}

impl<E> ChangeEnvelope<E> {
    pub fn new(event: ChangeEvent<E>) -> Self {
        Self {
            event,
            committed_at: Utc::now(),
        }
    }
}

/// Coarse, channel-side filter. Deletes carry only an id and always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScopeFilter {
    #[default]
    All,
    Space(String),
}

impl ScopeFilter {
    pub fn admits<E: Entity>(&self, event: &ChangeEvent<E>) -> bool {
        match (self, event) {
            (Self::All, _) | (_, ChangeEvent::Delete { .. }) => true,
            (Self::Space(space), ChangeEvent::Insert { entity } | ChangeEvent::Update { entity }) => {
                self.admits_entity_space(space, entity)
            }
        }
    }

    pub fn admits_entity<E: Entity>(&self, entity: &E) -> bool {
        match self {
            Self::All => true,
            Self::Space(space) => self.admits_entity_space(space, entity),
        }
    }

    // kinds without a space (milestones) pass; their scoping is the parent filter
    fn admits_entity_space<E: Entity>(&self, space: &str, entity: &E) -> bool {
        entity.space_id().is_none_or(|entity_space| entity_space == space)
    }
}

/// Push stream of committed writes from every client.
///
/// At-least-once, no ordering guarantee across clients.
pub trait ChangeChannel<E: Entity>: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope<E>>;
}
