use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};

use super::CalendarBackend;
use crate::models::{BusyPeriod, CalendarEvent, CalendarInfo, EventId, NewEvent, TimeInterval};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Google Calendar over its REST API. The bearer token is issued and
/// refreshed outside this service.
pub struct GoogleCalendar {
    calendar_id: String,
    access_token: String,
    timezone: Tz,
    client: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(calendar_id: String, access_token: String, timezone: Tz) -> Self {
        Self {
            calendar_id,
            access_token,
            timezone,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("calendar API base cannot take path segments"))?
            .extend(segments);
        Ok(url)
    }

    fn to_rfc3339(&self, local: NaiveDateTime) -> anyhow::Result<String> {
        let zoned = self
            .timezone
            .from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| anyhow::anyhow!("{local} does not exist in {}", self.timezone))?;
        Ok(zoned.to_rfc3339())
    }

    fn to_local(&self, rfc3339: &str) -> anyhow::Result<NaiveDateTime> {
        let parsed = DateTime::parse_from_rfc3339(rfc3339)
            .with_context(|| format!("invalid timestamp from calendar API: {rfc3339}"))?;
        Ok(parsed.with_timezone(&self.timezone).naive_local())
    }

    async fn calendar_metadata(&self) -> anyhow::Result<Value> {
        let data = self
            .client
            .get(self.url(&["calendars", &self.calendar_id])?)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(data)
    }

    fn parse_event(&self, data: &Value) -> anyhow::Result<CalendarEvent> {
        let id = str_at(data, &["id"]).context("event without id")?;
        let start = str_at(data, &["start", "dateTime"]).context("event without start time")?;
        let end = str_at(data, &["end", "dateTime"]).context("event without end time")?;
        let created_at = str_at(data, &["created"])
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|c| c.with_timezone(&Utc).naive_utc())
            .unwrap_or_else(|| Utc::now().naive_utc());

        Ok(CalendarEvent {
            id: id.to_string(),
            title: str_at(data, &["summary"]).unwrap_or("Busy").to_string(),
            description: str_at(data, &["description"]).map(|d| d.to_string()),
            start: self.to_local(start)?,
            end: self.to_local(end)?,
            created_at,
        })
    }
}

fn str_at<'a>(data: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter().try_fold(data, |v, key| v.get(key))?.as_str()
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    async fn query_busy(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        let body = json!({
            "timeMin": self.to_rfc3339(start)?,
            "timeMax": self.to_rfc3339(end)?,
            "timeZone": self.timezone.name(),
            "items": [{ "id": self.calendar_id }],
        });

        let data: Value = self
            .client
            .post(self.url(&["freeBusy"])?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google Calendar freeBusy")?
            .error_for_status()
            .context("Google Calendar freeBusy returned error")?
            .json()
            .await
            .context("failed to parse freeBusy response")?;

        let calendar = &data["calendars"][self.calendar_id.as_str()];
        if let Some(errors) = calendar["errors"].as_array().filter(|e| !e.is_empty()) {
            anyhow::bail!("freeBusy reported errors: {}", Value::Array(errors.clone()));
        }

        let mut busy = Vec::new();
        for period in calendar["busy"].as_array().into_iter().flatten() {
            let (Some(s), Some(e)) = (period["start"].as_str(), period["end"].as_str()) else {
                continue;
            };
            if let Some(interval) = TimeInterval::new(self.to_local(s)?, self.to_local(e)?) {
                busy.push(BusyPeriod::new(interval, None));
            }
        }

        tracing::debug!(count = busy.len(), "fetched busy periods");
        Ok(busy)
    }

    async fn create_event(&self, event: &NewEvent) -> anyhow::Result<EventId> {
        let body = json!({
            "summary": event.title,
            "description": event.description,
            "start": {
                "dateTime": event.start.format(LOCAL_FORMAT).to_string(),
                "timeZone": self.timezone.name(),
            },
            "end": {
                "dateTime": event.end.format(LOCAL_FORMAT).to_string(),
                "timeZone": self.timezone.name(),
            },
            "reminders": { "useDefault": true },
        });

        let data: Value = self
            .client
            .post(self.url(&["calendars", &self.calendar_id, "events"])?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google Calendar events.insert")?
            .error_for_status()
            .context("Google Calendar events.insert returned error")?
            .json()
            .await
            .context("failed to parse events.insert response")?;

        let id = data["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing id in events.insert response"))?;

        tracing::info!(event_id = %id, link = ?data["htmlLink"].as_str(), "calendar event created");
        Ok(id)
    }

    async fn get_event(&self, id: &str) -> anyhow::Result<Option<CalendarEvent>> {
        let resp = self
            .client
            .get(self.url(&["calendars", &self.calendar_id, "events", id])?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("failed to call Google Calendar events.get")?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let data: Value = resp
            .error_for_status()
            .context("Google Calendar events.get returned error")?
            .json()
            .await
            .context("failed to parse events.get response")?;

        self.parse_event(&data).map(Some)
    }

    async fn info(&self) -> CalendarInfo {
        match self.calendar_metadata().await {
            Ok(data) => CalendarInfo {
                backend: "google".to_string(),
                calendar: data["summary"].as_str().unwrap_or("Primary Calendar").to_string(),
                timezone: data["timeZone"]
                    .as_str()
                    .unwrap_or(self.timezone.name())
                    .to_string(),
                connected: true,
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not read Google calendar info");
                CalendarInfo {
                    backend: "google".to_string(),
                    calendar: self.calendar_id.clone(),
                    timezone: self.timezone.name().to_string(),
                    connected: false,
                }
            }
        }
    }
}
