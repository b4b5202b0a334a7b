use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::scheduling::DateRejection;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Calendar(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Recoverable failures inside a conversation turn. The message of each
/// variant is what the user is told; the turn then leaves the session as it
/// was before the message arrived.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("I couldn't understand the date. Could you be more specific? (e.g., 'today', 'tomorrow', 'Friday', 'March 15')")]
    DateParseFailure,

    #[error("{0}")]
    InvalidDateChoice(#[from] DateRejection),

    #[error("No available slots found for {window}. Would you like to try a different day or time?")]
    NoSlotsAvailable { window: String },

    #[error("Please select a number between 1 and {max}. Which slot works for you? Reply with the number (1-{max}).")]
    OutOfRangeSelection { max: usize },

    #[error("I don't have any slots on offer right now. Ask me to book a meeting and I'll suggest some times.")]
    NoActiveProposal,

    #[error("I'm having trouble checking availability right now. Please try again.")]
    CalendarQueryFailure(#[source] anyhow::Error),

    #[error("There was an error creating the calendar event. Please try again: say 'yes' to confirm or 'no' to cancel.")]
    CommitFailure(#[source] anyhow::Error),
}
