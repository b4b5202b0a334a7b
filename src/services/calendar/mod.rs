pub mod google;
pub mod local;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::{BusyPeriod, CalendarEvent, CalendarInfo, EventId, NewEvent};

/// The calendar the assistant books into. All times are naive local times
/// in the configured calendar timezone.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn query_busy(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> anyhow::Result<Vec<BusyPeriod>>;

    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<EventId>;

    async fn get_event(&self, id: &str) -> anyhow::Result<Option<CalendarEvent>>;

    async fn info(&self) -> CalendarInfo;
}

pub fn generate_ics(event: &CalendarEvent, timezone: &str) -> String {
    let dtstart = event.start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = event.end.format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = event.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@booking-agent", event.id);
    let summary = escape_text(&event.title);
    let description = escape_text(event.description.as_deref().unwrap_or("No additional notes"));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Booking Agent//Scheduling Assistant//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART;TZID={timezone}:{dtstart}\r\n\
         DTEND;TZID={timezone}:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
