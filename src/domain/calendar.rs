use crate::core::Entity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Entry on the shared household calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub space_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventDraft {
    pub space_id: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    /// Defaults to one hour after `starts_at`.
    pub ends_at: Option<DateTime<Utc>>,
    pub all_day: bool,
}

impl CalendarEventDraft {
    pub fn new(
        space_id: impl Into<String>,
        title: impl Into<String>,
        starts_at: DateTime<Utc>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            title: title.into(),
            description: None,
            starts_at,
            ends_at: None,
            all_day: false,
        }
    }

    pub fn ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn all_day(mut self) -> Self {
        self.all_day = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl CalendarEventPatch {
    /// Moves the event, keeping its duration.
    pub fn reschedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            starts_at: Some(starts_at),
            ends_at: Some(ends_at),
            ..Self::default()
        }
    }
}

impl Entity for CalendarEvent {
    type Draft = CalendarEventDraft;
    type Patch = CalendarEventPatch;

    const KIND: &'static str = "Event";

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn space_id(&self) -> Option<&str> {
        Some(&self.space_id)
    }

    fn revision(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn content_fingerprint(&self) -> String {
        let mut content = self.clone();
        content.updated_at = self.created_at;
        format!("{content:?}")
    }

    fn from_draft(id: String, draft: &CalendarEventDraft, now: DateTime<Utc>) -> Self {
        let ends_at = draft
            .ends_at
            .filter(|ends_at| *ends_at >= draft.starts_at)
            .unwrap_or_else(|| {
                draft
                    .starts_at
                    .checked_add_signed(Duration::hours(1))
                    .unwrap_or(draft.starts_at)
            });
        Self {
            id,
            space_id: draft.space_id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            starts_at: draft.starts_at,
            ends_at,
            all_day: draft.all_day,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &CalendarEventPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(starts_at) = patch.starts_at {
            self.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            self.ends_at = ends_at;
        }
        if let Some(all_day) = patch.all_day {
            self.all_day = all_day;
        }
        // an event never ends before it starts
        if self.ends_at < self.starts_at {
            self.ends_at = self.starts_at;
        }
        self.updated_at = now;
    }
}
