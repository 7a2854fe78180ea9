use crate::core::{Entity, ProgressStatus, StatusEntity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Household goal ("Save for the trip", "Repaint the kitchen").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub space_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProgressStatus,
    /// Percentage in `0..=100`.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDraft {
    pub space_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

impl GoalDraft {
    pub fn new(space_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            title: title.into(),
            description: None,
            target_date: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }
}

/// Partial goal update. `None` leaves a field untouched; the nested options
/// allow clearing nullable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<Option<NaiveDate>>,
}

impl GoalPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn status(status: ProgressStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

impl Entity for Goal {
    type Draft = GoalDraft;
    type Patch = GoalPatch;

    const KIND: &'static str = "Goal";

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

    fn from_draft(id: String, draft: &GoalDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            space_id: draft.space_id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: ProgressStatus::NotStarted,
            progress: 0,
            target_date: draft.target_date,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &GoalPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.min(100);
        }
        if let Some(target_date) = patch.target_date {
            self.target_date = target_date;
        }
        if let Some(status) = patch.status {
            self.status = status;
            if status == ProgressStatus::Completed {
                self.progress = 100;
            }
        }
        self.updated_at = now;
    }
}

impl StatusEntity for Goal {
    fn status(&self) -> ProgressStatus {
        self.status
    }

    fn status_patch(status: ProgressStatus) -> GoalPatch {
        GoalPatch::status(status)
    }
}

/// Checkpoint belonging to a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub goal_id: String,
    pub title: String,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDraft {
    pub goal_id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

impl MilestoneDraft {
    pub fn new(goal_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            title: title.into(),
            due_date: None,
        }
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestonePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl Entity for Milestone {
    type Draft = MilestoneDraft;
    type Patch = MilestonePatch;

    const KIND: &'static str = "Milestone";

    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.goal_id)
    }

    fn revision(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn content_fingerprint(&self) -> String {
        let mut content = self.clone();
        content.updated_at = self.created_at;
        format!("{content:?}")
    }

    fn from_draft(id: String, draft: &MilestoneDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            goal_id: draft.goal_id.clone(),
            title: draft.title.clone(),
            status: ProgressStatus::NotStarted,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &MilestonePatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        self.updated_at = now;
    }
}

impl StatusEntity for Milestone {
    fn status(&self) -> ProgressStatus {
        self.status
    }

    fn status_patch(status: ProgressStatus) -> MilestonePatch {
        MilestonePatch {
            status: Some(status),
            ..MilestonePatch::default()
        }
    }
}
