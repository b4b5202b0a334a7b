use crate::errors::BookingError;
use crate::models::{EventId, NewEvent, TimeInterval};
use crate::services::calendar::CalendarBackend;

/// Writes the confirmed slot to the calendar.
///
/// Runs at most once per confirmed selection: the caller clears the
/// selection on success, so a repeated confirmation has nothing to commit.
/// On failure the selection is left for the caller to retry.
pub async fn commit(
    calendar: &dyn CalendarBackend,
    slot: &TimeInterval,
    title: &str,
    description: &str,
) -> Result<EventId, BookingError> {
    let event = NewEvent::for_slot(slot, title, description);

    match calendar.create_event(&event).await {
        Ok(event_id) => {
            tracing::info!(event_id = %event_id, start = %slot.start, end = %slot.end, "booking committed");
            Ok(event_id)
        }
        Err(e) => {
            tracing::error!(error = %e, start = %slot.start, "failed to create calendar event");
            Err(BookingError::CommitFailure(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::models::{BusyPeriod, CalendarEvent, CalendarInfo};

    struct RecordingCalendar {
        created: Mutex<Vec<NewEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl CalendarBackend for RecordingCalendar {
        async fn query_busy(
            &self,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> anyhow::Result<Vec<BusyPeriod>> {
            Ok(vec![])
        }

        async fn create_event(&self, event: &NewEvent) -> anyhow::Result<EventId> {
            if self.fail {
                anyhow::bail!("backend unavailable");
            }
            self.created.lock().unwrap().push(event.clone());
            Ok("evt-1".to_string())
        }

        async fn get_event(&self, _id: &str) -> anyhow::Result<Option<CalendarEvent>> {
            Ok(None)
        }

        async fn info(&self) -> CalendarInfo {
            CalendarInfo {
                backend: "test".to_string(),
                calendar: "test".to_string(),
                timezone: "UTC".to_string(),
                connected: true,
            }
        }
    }

    fn slot() -> TimeInterval {
        let start = NaiveDateTime::parse_from_str("2026-10-20 14:00", "%Y-%m-%d %H:%M").unwrap();
        TimeInterval::starting_at(start, Duration::hours(1)).unwrap()
    }

    #[tokio::test]
    async fn test_commit_writes_slot() {
        let calendar = RecordingCalendar {
            created: Mutex::new(vec![]),
            fail: false,
        };
        let id = commit(&calendar, &slot(), "Call", "Scheduled via booking assistant")
            .await
            .unwrap();
        assert_eq!(id, "evt-1");

        let created = calendar.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "Call");
        assert_eq!(created[0].end - created[0].start, Duration::hours(1));
    }

    #[tokio::test]
    async fn test_backend_failure_is_commit_failure() {
        let calendar = RecordingCalendar {
            created: Mutex::new(vec![]),
            fail: true,
        };
        let err = commit(&calendar, &slot(), "Meeting", "").await.unwrap_err();
        assert!(matches!(err, BookingError::CommitFailure(_)));
    }
}
