use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::intent::{Entities, HourRange, TimePeriod};
use super::slot::CandidateSlot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingTimeDetail,
    ProposalMade,
    AwaitingConfirmation,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingTimeDetail => "awaiting_time_detail",
            ConversationState::ProposalMade => "proposal_made",
            ConversationState::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

/// Booking details accumulated across turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingDraft {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub time_period: Option<TimePeriod>,
    pub time_range: Option<HourRange>,
    pub duration_minutes: Option<i64>,
    pub subject: Option<String>,
}

impl BookingDraft {
    pub fn from_entities(date: Option<NaiveDate>, entities: &Entities) -> Self {
        Self {
            date,
            time: entities.time,
            time_period: entities.time_period,
            time_range: entities.time_range,
            duration_minutes: entities.duration_minutes,
            subject: entities.subject.clone(),
        }
    }

    /// Newer details win; anything the message didn't mention is kept.
    pub fn merged_with(&self, date: Option<NaiveDate>, entities: &Entities) -> Self {
        let mut merged = self.clone();
        if date.is_some() {
            merged.date = date;
        }
        if entities.has_time_detail() {
            merged.time = entities.time;
            merged.time_period = entities.time_period;
            merged.time_range = entities.time_range;
        }
        if entities.duration_minutes.is_some() {
            merged.duration_minutes = entities.duration_minutes;
        }
        if entities.subject.is_some() {
            merged.subject = entities.subject.clone();
        }
        merged
    }

    pub fn has_time_detail(&self) -> bool {
        self.time.is_some() || self.time_period.is_some() || self.time_range.is_some()
    }

    /// How the requested time reads back to the user, e.g. "afternoon".
    pub fn time_label(&self) -> String {
        if let Some(range) = self.time_range {
            format!("between {}:00 and {}:00", range.start_hour, range.end_hour)
        } else if let Some(period) = self.time_period {
            period.as_str().to_string()
        } else if let Some(time) = self.time {
            time.format("%I:%M %p").to_string()
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// Per-session conversation, owned exclusively by its session id.
///
/// `pending_slots` and `selected_slot` are never both populated: selecting a
/// slot moves it out of the proposal round, and every new round clears the
/// selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub messages: Vec<ConversationMessage>,
    pub state: ConversationState,
    pub pending_slots: Vec<CandidateSlot>,
    pub selected_slot: Option<CandidateSlot>,
    pub draft: BookingDraft,
    pub booking_confirmed: bool,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Conversation {
    pub fn new(session_id: &str, now: NaiveDateTime, ttl: Duration) -> Self {
        Self {
            session_id: session_id.to_string(),
            messages: vec![],
            state: ConversationState::Idle,
            pending_slots: vec![],
            selected_slot: None,
            draft: BookingDraft::default(),
            booking_confirmed: false,
            last_activity: now,
            expires_at: now + ttl,
        }
    }

    /// Drops every in-flight booking field and returns to `Idle`.
    pub fn reset_booking(&mut self) {
        self.pending_slots.clear();
        self.selected_slot = None;
        self.draft = BookingDraft::default();
        self.state = ConversationState::Idle;
    }

    /// Starts a new proposal round, invalidating any earlier indices.
    pub fn propose(&mut self, slots: Vec<CandidateSlot>, draft: BookingDraft) {
        self.pending_slots = slots;
        self.selected_slot = None;
        self.draft = draft;
        self.state = ConversationState::ProposalMade;
    }

    pub fn has_booking_in_progress(&self) -> bool {
        self.state != ConversationState::Idle
            || !self.pending_slots.is_empty()
            || self.selected_slot.is_some()
    }

    pub fn touch(&mut self, now: NaiveDateTime, ttl: Duration) {
        self.last_activity = now;
        self.expires_at = now + ttl;
    }
}
