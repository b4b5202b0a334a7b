use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "intent")]
pub enum Intent {
    Greeting,
    AvailabilityCheck,
    BookingRequest,
    SlotSelection { index: usize },
    Confirmation { accepted: bool },
    Cancellation,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::AvailabilityCheck => "availability_check",
            Intent::BookingRequest => "booking_request",
            Intent::SlotSelection { .. } => "slot_selection",
            Intent::Confirmation { .. } => "confirmation",
            Intent::Cancellation => "cancellation",
            Intent::Unknown => "unknown",
        }
    }
}

/// A date as the user said it, resolved against "today" only when used.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateHint {
    Today,
    Tomorrow,
    Weekday { day: Weekday, next: bool },
    MonthDay { month: u32, day: u32 },
    Exact(NaiveDate),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Morning,
    Afternoon,
    Evening,
}

impl TimePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Morning => "morning",
            TimePeriod::Afternoon => "afternoon",
            TimePeriod::Evening => "evening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Some(TimePeriod::Morning),
            "afternoon" => Some(TimePeriod::Afternoon),
            "evening" => Some(TimePeriod::Evening),
            _ => None,
        }
    }
}

/// Whole-hour window from a "between H and H" request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourRange {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Everything the extractor could pull out of one message, whatever the intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entities {
    pub date: Option<DateHint>,
    pub time: Option<NaiveTime>,
    pub time_period: Option<TimePeriod>,
    pub time_range: Option<HourRange>,
    pub duration_minutes: Option<i64>,
    /// "Call", "Meeting" or "Appointment", used as the event title.
    pub subject: Option<String>,
}

impl Entities {
    pub fn has_time_detail(&self) -> bool {
        self.time.is_some() || self.time_period.is_some() || self.time_range.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub entities: Entities,
}
