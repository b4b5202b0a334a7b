use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` in the configured calendar timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn starting_at(start: NaiveDateTime, duration: Duration) -> Option<Self> {
        Self::new(start, start + duration)
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// e.g. `10:00 AM - 11:00 AM`
    pub fn time_range_label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%I:%M %p"),
            self.end.format("%I:%M %p")
        )
    }

    /// e.g. `Tuesday, October 20`
    pub fn day_label(&self) -> String {
        self.start.format("%A, %B %d").to_string()
    }
}

/// An interval during which the calendar owner is unavailable, as reported
/// by the calendar backend. Arrives unordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyPeriod {
    #[serde(flatten)]
    pub interval: TimeInterval,
    pub label: Option<String>,
}

impl BusyPeriod {
    pub fn new(interval: TimeInterval, label: Option<String>) -> Self {
        Self { interval, label }
    }
}

/// A proposed slot. `index` is 1-based and only meaningful within the
/// proposal round that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub index: usize,
    #[serde(flatten)]
    pub interval: TimeInterval,
}

impl CandidateSlot {
    /// Numbers a fresh proposal round starting at 1.
    pub fn number(intervals: impl IntoIterator<Item = TimeInterval>) -> Vec<CandidateSlot> {
        intervals
            .into_iter()
            .enumerate()
            .map(|(i, interval)| CandidateSlot {
                index: i + 1,
                interval,
            })
            .collect()
    }
}
