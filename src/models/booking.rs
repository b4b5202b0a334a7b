use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::slot::TimeInterval;

pub type EventId = String;

/// An event to be written to the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl NewEvent {
    pub fn for_slot(slot: &TimeInterval, title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            start: slot.start,
            end: slot.end,
        }
    }
}

/// An event as stored by a calendar backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub backend: String,
    pub calendar: String,
    pub timezone: String,
    pub connected: bool,
}
