use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::models::{BookingDraft, BusyPeriod, TimeInterval, TimePeriod, WorkingHoursPolicy};

/// Why a resolved date can't be offered at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRejection {
    PastDate,
    NoWorkSlots { day: String, weekend: bool },
    WorkDayEnded { closes: String },
}

impl std::fmt::Display for DateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRejection::PastDate => {
                write!(f, "That date has already passed. Please choose a future date.")
            }
            DateRejection::NoWorkSlots { day, weekend: true } => {
                write!(
                    f,
                    "It's the weekend! You don't have work slots for {day}. How about choosing a weekday instead?"
                )
            }
            DateRejection::NoWorkSlots { day, weekend: false } => {
                write!(
                    f,
                    "You don't have work slots for {day}. How about choosing another day?"
                )
            }
            DateRejection::WorkDayEnded { closes } => {
                write!(
                    f,
                    "Your work day has ended! You don't have slots after {closes}. Please choose tomorrow or another day."
                )
            }
        }
    }
}

impl std::error::Error for DateRejection {}

/// Gates every resolved date passes before any slot computation.
pub fn validate_date(
    date: NaiveDate,
    now: NaiveDateTime,
    policy: &WorkingHoursPolicy,
) -> Result<(), DateRejection> {
    if date < now.date() {
        return Err(DateRejection::PastDate);
    }
    if policy.is_excluded_day(date.weekday()) {
        return Err(DateRejection::NoWorkSlots {
            day: date.format("%A, %B %d").to_string(),
            weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        });
    }
    if date == now.date() && now.hour() >= policy.end_hour {
        return Err(DateRejection::WorkDayEnded {
            closes: policy.closes_at(date).format("%-I:%M %p").to_string(),
        });
    }
    Ok(())
}

/// Free slots of `policy.slot_duration` between `range_start` and
/// `range_end`, ordered by start.
///
/// Candidates start at the later of `range_start` and `now + lead_time`,
/// rounded up to a step boundary, and advance by `slot_step`. A candidate
/// is kept when it fits inside the range and the working day, misses every
/// excluded window and overlaps no busy period.
pub fn compute_free_slots(
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    busy: &[BusyPeriod],
    policy: &WorkingHoursPolicy,
    now: NaiveDateTime,
) -> Vec<TimeInterval> {
    let earliest = now + policy.lead_time();
    let start = round_up_to_step(range_start.max(earliest), policy.slot_step_minutes);
    if start >= range_end {
        return Vec::new();
    }

    let mut sorted: Vec<&TimeInterval> = busy.iter().map(|b| &b.interval).collect();
    sorted.sort_by_key(|b| b.start);

    let duration = policy.slot_duration();
    let step = policy.slot_step();
    let mut slots = Vec::new();
    let mut cursor = start;

    while let Some(candidate) = TimeInterval::starting_at(cursor, duration) {
        if candidate.end > range_end {
            break;
        }
        if policy.admits(&candidate) && !conflicts(&candidate, &sorted) {
            slots.push(candidate);
        }
        cursor += step;
    }

    slots
}

// `busy` must be sorted by start.
fn conflicts(candidate: &TimeInterval, busy: &[&TimeInterval]) -> bool {
    busy.iter()
        .take_while(|b| b.start < candidate.end)
        .any(|b| b.end > candidate.start)
}

fn round_up_to_step(t: NaiveDateTime, step_minutes: i64) -> NaiveDateTime {
    let midnight = t.date().and_time(NaiveTime::MIN);
    let step_secs = step_minutes * 60;
    let elapsed = (t - midnight).num_seconds();
    let rem = elapsed % step_secs;
    if rem == 0 && t.nanosecond() == 0 {
        return t;
    }
    midnight + Duration::seconds(elapsed - rem + step_secs)
}

/// Search window for a booking request on `date`, clamped to business
/// hours. `None` when the requested hours leave nothing to search.
pub fn requested_window(
    date: NaiveDate,
    draft: &BookingDraft,
    policy: &WorkingHoursPolicy,
) -> Option<TimeInterval> {
    let at = |hour: u32| date.and_time(NaiveTime::MIN) + Duration::hours(hour as i64);
    let open = policy.opens_at(date);
    let close = policy.closes_at(date);
    let duration = draft
        .duration_minutes
        .map(Duration::minutes)
        .unwrap_or_else(|| policy.slot_duration());

    let (start, end) = if let Some(range) = draft.time_range {
        (at(range.start_hour), at(range.end_hour).min(close))
    } else if let Some(period) = draft.time_period {
        match period {
            TimePeriod::Morning => (open, at(12)),
            TimePeriod::Afternoon => (at(12), at(17)),
            TimePeriod::Evening => (at(17), close),
        }
    } else if let Some(time) = draft.time {
        let mut start = date.and_time(time);
        if start + duration > close {
            start = close - duration;
        }
        (start, start + duration)
    } else {
        (open, close)
    };

    TimeInterval::new(start, end.min(close))
}
