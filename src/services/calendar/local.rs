use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use super::CalendarBackend;
use crate::db::queries;
use crate::models::{BusyPeriod, CalendarEvent, CalendarInfo, EventId, NewEvent, TimeInterval};

/// Calendar kept in the service's own SQLite database.
pub struct LocalCalendar {
    db: Arc<Mutex<Connection>>,
    timezone: String,
}

impl LocalCalendar {
    pub fn new(db: Arc<Mutex<Connection>>, timezone: &str) -> Self {
        Self {
            db,
            timezone: timezone.to_string(),
        }
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("calendar database lock poisoned"))
    }
}

#[async_trait]
impl CalendarBackend for LocalCalendar {
    async fn query_busy(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        let events = {
            let db = self.conn()?;
            queries::get_events_in_range(&db, &start, &end)?
        };

        Ok(events
            .into_iter()
            .filter_map(|e| {
                TimeInterval::new(e.start, e.end).map(|interval| BusyPeriod::new(interval, Some(e.title)))
            })
            .collect())
    }

    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<EventId> {
        let stored = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            title: event.title.clone(),
            description: Some(event.description.clone()),
            start: event.start,
            end: event.end,
            created_at: Utc::now().naive_utc(),
        };

        {
            let db = self.conn()?;
            queries::insert_event(&db, &stored)?;
        }

        tracing::info!(event_id = %stored.id, start = %stored.start, "calendar event created");
        Ok(stored.id)
    }

    async fn get_event(&self, id: &str) -> anyhow::Result<Option<CalendarEvent>> {
        let db = self.conn()?;
        queries::get_event_by_id(&db, id)
    }

    async fn info(&self) -> CalendarInfo {
        let connected = self
            .conn()
            .and_then(|db| queries::count_events(&db))
            .is_ok();
        CalendarInfo {
            backend: "local".to_string(),
            calendar: "primary".to_string(),
            timezone: self.timezone.clone(),
            connected,
        }
    }
}
