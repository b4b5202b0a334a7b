use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::config::AppConfig;
use crate::models::WorkingHoursPolicy;
use crate::services::ai::IntentClassifier;
use crate::services::calendar::CalendarBackend;
use crate::services::session::{SessionStore, TurnLocks};

pub struct AppState {
    pub config: AppConfig,
    pub policy: WorkingHoursPolicy,
    pub timezone: Tz,
    pub classifier: Box<dyn IntentClassifier>,
    pub calendar: Arc<dyn CalendarBackend>,
    pub sessions: Box<dyn SessionStore>,
    pub turn_locks: TurnLocks,
}

impl AppState {
    /// Wall-clock time in the calendar timezone.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}
