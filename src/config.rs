use std::env;
use std::str::FromStr;

use chrono::Duration;
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::availability::parse_weekday;
use crate::models::{DailyWindow, WorkingHoursPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub timezone: String,
    pub business_open_hour: u32,
    pub business_close_hour: u32,
    /// Comma-separated weekday names, e.g. `sat,sun`.
    pub excluded_weekdays: String,
    /// Comma-separated `HH:MM-HH:MM` windows; empty for none.
    pub lunch_break: String,
    pub slot_duration_minutes: i64,
    pub slot_step_minutes: i64,
    pub lead_time_minutes: i64,
    pub session_ttl_minutes: i64,
    pub intent_classifier: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub calendar_backend: String,
    pub google_calendar_id: String,
    pub google_access_token: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 3000),
            database_url: env_string("DATABASE_URL", "booking_agent.db"),
            timezone: env_string("TIMEZONE", "UTC"),
            business_open_hour: env_or("BUSINESS_OPEN_HOUR", 9),
            business_close_hour: env_or("BUSINESS_CLOSE_HOUR", 18),
            excluded_weekdays: env_string("EXCLUDED_WEEKDAYS", "sat,sun"),
            lunch_break: env_string("LUNCH_BREAK", "12:00-13:00"),
            slot_duration_minutes: env_or("SLOT_DURATION_MINUTES", 60),
            slot_step_minutes: env_or("SLOT_STEP_MINUTES", 30),
            lead_time_minutes: env_or("LEAD_TIME_MINUTES", 60),
            session_ttl_minutes: env_or("SESSION_TTL_MINUTES", 30),
            intent_classifier: env_string("INTENT_CLASSIFIER", "rules"),
            ollama_url: env_string("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: env_string("OLLAMA_MODEL", "llama3.2"),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env_string("GROQ_MODEL", "llama-3.1-8b-instant"),
            calendar_backend: env_string("CALENDAR_BACKEND", "local"),
            google_calendar_id: env_string("GOOGLE_CALENDAR_ID", "primary"),
            google_access_token: env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default(),
        }
    }

    /// The calendar timezone. Unknown names fall back to UTC.
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(timezone = %self.timezone, "unknown timezone, using UTC");
                Tz::UTC
            }
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::minutes(self.session_ttl_minutes)
    }

    pub fn working_hours(&self) -> Result<WorkingHoursPolicy, AppError> {
        let excluded_weekdays = self
            .excluded_weekdays
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(parse_weekday)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let excluded_windows = self
            .lunch_break
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(DailyWindow::parse)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let policy = WorkingHoursPolicy {
            start_hour: self.business_open_hour,
            end_hour: self.business_close_hour,
            excluded_weekdays,
            excluded_windows,
            slot_duration_minutes: self.slot_duration_minutes,
            slot_step_minutes: self.slot_step_minutes,
            lead_time_minutes: self.lead_time_minutes,
        };
        policy
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(policy)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            timezone: "UTC".to_string(),
            business_open_hour: 9,
            business_close_hour: 18,
            excluded_weekdays: "sat,sun".to_string(),
            lunch_break: String::new(),
            slot_duration_minutes: 60,
            slot_step_minutes: 30,
            lead_time_minutes: 60,
            session_ttl_minutes: 30,
            intent_classifier: "rules".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            groq_api_key: String::new(),
            groq_model: "llama-3.1-8b-instant".to_string(),
            calendar_backend: "local".to_string(),
            google_calendar_id: "primary".to_string(),
            google_access_token: String::new(),
        }
    }
}
