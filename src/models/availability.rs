use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use super::slot::TimeInterval;

/// A recurring intraday window that is never bookable (e.g. lunch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    /// Parses `HH:MM-HH:MM`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("invalid window format: {s}"))?;
        let start = parse_time(start.trim())?;
        let end = parse_time(end.trim())?;
        if start >= end {
            return Err(anyhow::anyhow!("window must end after it starts: {s}"));
        }
        Ok(Self { start, end })
    }

    pub fn on(&self, date: NaiveDate) -> TimeInterval {
        TimeInterval {
            start: date.and_time(self.start),
            end: date.and_time(self.end),
        }
    }
}

/// Rules deciding which intervals are bookable.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingHoursPolicy {
    pub start_hour: u32,
    pub end_hour: u32,
    pub excluded_weekdays: Vec<Weekday>,
    pub excluded_windows: Vec<DailyWindow>,
    pub slot_duration_minutes: i64,
    pub slot_step_minutes: i64,
    pub lead_time_minutes: i64,
}

impl Default for WorkingHoursPolicy {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 18,
            excluded_weekdays: vec![Weekday::Sat, Weekday::Sun],
            excluded_windows: Vec::new(),
            slot_duration_minutes: 60,
            slot_step_minutes: 30,
            lead_time_minutes: 60,
        }
    }
}

impl WorkingHoursPolicy {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.start_hour >= self.end_hour {
            anyhow::bail!(
                "business hours must open before they close ({} >= {})",
                self.start_hour,
                self.end_hour
            );
        }
        if self.end_hour > 24 {
            anyhow::bail!("closing hour out of range: {}", self.end_hour);
        }
        if self.slot_duration_minutes <= 0 || self.slot_step_minutes <= 0 {
            anyhow::bail!("slot duration and step must be positive");
        }
        if self.lead_time_minutes < 0 {
            anyhow::bail!("lead time cannot be negative");
        }
        Ok(())
    }

    /// Same policy with a different meeting length.
    pub fn with_duration(&self, minutes: i64) -> Self {
        Self {
            slot_duration_minutes: minutes,
            ..self.clone()
        }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_duration_minutes)
    }

    pub fn slot_step(&self) -> Duration {
        Duration::minutes(self.slot_step_minutes)
    }

    pub fn lead_time(&self) -> Duration {
        Duration::minutes(self.lead_time_minutes)
    }

    pub fn is_excluded_day(&self, day: Weekday) -> bool {
        self.excluded_weekdays.contains(&day)
    }

    pub fn opens_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(self.start_hour as i64)
    }

    pub fn closes_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(self.end_hour as i64)
    }

    /// The whole bookable span of one day, ignoring busy periods.
    pub fn working_day(&self, date: NaiveDate) -> TimeInterval {
        TimeInterval {
            start: self.opens_at(date),
            end: self.closes_at(date),
        }
    }

    /// True if `[start, start + duration)` sits within opening hours on one
    /// non-excluded day and clears every excluded window.
    pub fn admits(&self, slot: &TimeInterval) -> bool {
        let date = slot.start.date();
        if self.is_excluded_day(date.weekday()) {
            return false;
        }
        if slot.start < self.opens_at(date) || slot.end > self.closes_at(date) {
            return false;
        }
        !self
            .excluded_windows
            .iter()
            .any(|w| w.on(date).overlaps(slot))
    }

    pub fn to_human_readable(&self) -> String {
        let day_order = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];

        let open_days: Vec<String> = day_order
            .iter()
            .filter(|d| !self.is_excluded_day(**d))
            .map(|d| capitalize(&d.to_string()))
            .collect();

        if open_days.is_empty() {
            return String::new();
        }

        let mut readable = format!(
            "{}: {:02}:00-{:02}:00",
            open_days.join(", "),
            self.start_hour,
            self.end_hour
        );
        for window in &self.excluded_windows {
            readable.push_str(&format!(
                " (closed {}-{})",
                window.start.format("%H:%M"),
                window.end.format("%H:%M")
            ));
        }
        readable
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

pub fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.trim().to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}
