use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn calendar_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let info = state.calendar.info().await;
    Json(json!({
        "backend": info.backend,
        "calendar": info.calendar,
        "timezone": info.timezone,
        "connected": info.connected,
        "working_hours": state.policy.to_human_readable(),
        "slot_duration_minutes": state.policy.slot_duration_minutes,
        "slot_step_minutes": state.policy.slot_step_minutes,
        "lead_time_minutes": state.policy.lead_time_minutes,
    }))
}

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let event = state
        .calendar
        .get_event(event_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, event_id, "failed to load event for .ics");
            AppError::Calendar("could not load event".to_string())
        })?
        .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;

    let ics = generate_ics(&event, state.timezone.name());
    let filename = format!("booking-{event_id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
