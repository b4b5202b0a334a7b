//! Date, time and duration hints pulled out of free text.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use crate::models::{DateHint, Entities, HourRange, TimePeriod};

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

pub struct EntityExtractor {
    today: Regex,
    tomorrow: Regex,
    weekday: Regex,
    iso_date: Regex,
    numeric_date: Regex,
    month_day: Regex,
    clock_12h: Regex,
    clock_24h: Regex,
    hour_range: Regex,
    duration: Regex,
    half_hour: Regex,
    subject: Regex,
}

impl EntityExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            today: Regex::new(r"\b(today|tonight)\b")?,
            tomorrow: Regex::new(r"\btomorrow\b")?,
            weekday: Regex::new(
                r"\b(?:(next)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )?,
            iso_date: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b")?,
            numeric_date: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})\b")?,
            month_day: Regex::new(
                r"\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+(\d{1,2})(?:st|nd|rd|th)?\b",
            )?,
            clock_12h: Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")?,
            clock_24h: Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b")?,
            hour_range: Regex::new(
                r"\bbetween\s+(\d{1,2})(?::00)?\s*(am|pm)?\s*(?:-|and|to)\s*(\d{1,2})(?::00)?\s*(am|pm)?",
            )?,
            duration: Regex::new(r"\b(\d{1,3})\s*(minutes?|mins?|hours?|hrs?)\b")?,
            half_hour: Regex::new(r"\bhalf\s+an?\s+hour\b")?,
            subject: Regex::new(r"\b(call|meeting|appointment)\b")?,
        })
    }

    pub fn extract(&self, message: &str) -> Entities {
        let text = message.to_lowercase();
        let time_range = self.extract_range(&text);
        // "between 3-5" must not read as a March 5th date or a 5pm start
        let rest = self.hour_range.replace_all(&text, " ");

        Entities {
            date: self.extract_date(&rest),
            time: self.extract_time(&rest),
            time_period: extract_period(&text),
            time_range,
            duration_minutes: self.extract_duration(&text),
            subject: self
                .subject
                .captures(&text)
                .map(|c| capitalize(&c[1])),
        }
    }

    pub fn extract_date(&self, text: &str) -> Option<DateHint> {
        let text = text.to_lowercase();
        if self.today.is_match(&text) {
            return Some(DateHint::Today);
        }
        if self.tomorrow.is_match(&text) {
            return Some(DateHint::Tomorrow);
        }
        if let Some(caps) = self.weekday.captures(&text) {
            let day = WEEKDAYS
                .iter()
                .find(|(name, _)| *name == &caps[2])
                .map(|(_, day)| *day)?;
            return Some(DateHint::Weekday {
                day,
                next: caps.get(1).is_some(),
            });
        }
        if let Some(caps) = self.iso_date.captures(&text) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day).map(DateHint::Exact);
        }
        if let Some(caps) = self.numeric_date.captures(&text) {
            return Some(DateHint::MonthDay {
                month: caps[1].parse().ok()?,
                day: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = self.month_day.captures(&text) {
            let month = MONTHS.iter().position(|m| caps[1].starts_with(m))? as u32 + 1;
            return Some(DateHint::MonthDay {
                month,
                day: caps[2].parse().ok()?,
            });
        }
        None
    }

    pub fn extract_time(&self, text: &str) -> Option<NaiveTime> {
        let text = text.to_lowercase();
        if let Some(caps) = self.clock_12h.captures(&text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
            if !(1..=12).contains(&hour) {
                return None;
            }
            return NaiveTime::from_hms_opt(to_24h(hour, Some(&caps[3])), minute, 0);
        }
        let caps = self.clock_24h.captures(&text)?;
        NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0)
    }

    fn extract_range(&self, text: &str) -> Option<HourRange> {
        let caps = self.hour_range.captures(text)?;
        let start: u32 = caps[1].parse().ok()?;
        let end: u32 = caps[3].parse().ok()?;
        let start_suffix = caps.get(2).map(|m| m.as_str());
        let end_suffix = caps.get(4).map(|m| m.as_str());

        let end_hour = range_hour(end, end_suffix);
        let start_hour = match (start_suffix, end_suffix) {
            (None, Some("pm")) if start < 12 && start + 12 <= end_hour => start + 12,
            _ => range_hour(start, start_suffix),
        };

        (start_hour < end_hour && end_hour <= 24).then_some(HourRange {
            start_hour,
            end_hour,
        })
    }

    fn extract_duration(&self, text: &str) -> Option<i64> {
        if self.half_hour.is_match(text) {
            return Some(30);
        }
        let caps = self.duration.captures(text)?;
        let amount: i64 = caps[1].parse().ok()?;
        let minutes = if caps[2].starts_with('h') {
            amount * 60
        } else {
            amount
        };
        (5..=480).contains(&minutes).then_some(minutes)
    }
}

fn extract_period(text: &str) -> Option<TimePeriod> {
    if text.contains("morning") {
        Some(TimePeriod::Morning)
    } else if text.contains("afternoon") {
        Some(TimePeriod::Afternoon)
    } else if text.contains("evening") || text.contains("tonight") {
        Some(TimePeriod::Evening)
    } else {
        None
    }
}

fn to_24h(hour: u32, suffix: Option<&str>) -> u32 {
    match suffix {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        _ => hour,
    }
}

// Bare hours below 8 mean afternoon ("between 2 and 4").
fn range_hour(hour: u32, suffix: Option<&str>) -> u32 {
    match suffix {
        None if (1..8).contains(&hour) => hour + 12,
        _ => to_24h(hour, suffix),
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

/// Resolves a hint to a calendar date. `None` for impossible dates like 2/30.
pub fn resolve_date(hint: DateHint, today: NaiveDate) -> Option<NaiveDate> {
    match hint {
        DateHint::Today => Some(today),
        DateHint::Tomorrow => today.succ_opt(),
        DateHint::Weekday { day, next } => {
            let current = today.weekday().num_days_from_monday() as i64;
            let target = day.num_days_from_monday() as i64;
            let mut ahead = (target - current).rem_euclid(7);
            if ahead == 0 {
                ahead = 7;
            } else if next {
                ahead += 7;
            }
            Some(today + Duration::days(ahead))
        }
        DateHint::MonthDay { month, day } => NaiveDate::from_ymd_opt(today.year(), month, day),
        DateHint::Exact(date) => Some(date),
    }
}
