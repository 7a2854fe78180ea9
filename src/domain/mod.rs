//! Entity kinds of the household app.
//!
//! Each kind plugs into the same sync engine through the `Entity` trait; none
//! of them carries sync logic of its own.

pub mod calendar;
pub mod goals;

pub use calendar::{CalendarEvent, CalendarEventDraft, CalendarEventPatch};
pub use goals::{Goal, GoalDraft, GoalPatch, Milestone, MilestoneDraft, MilestonePatch};
