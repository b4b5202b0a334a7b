use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::ConversationMessage;
use crate::services::conversation;
use crate::state::AppState;

const APOLOGY: &str = "I had trouble processing your request. Could you try again?";

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub conversation_history: Vec<ConversationMessage>,
    pub booking_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = payload
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = conversation::process_message(
        &state,
        &session_id,
        message,
        payload.conversation_history.clone(),
        || state.now(),
    )
    .await;

    let response = match result {
        Ok(reply) => ChatResponse {
            response: reply.response,
            session_id,
            conversation_history: reply.history,
            booking_confirmed: reply.booking_confirmed,
            event_id: reply.event_id,
        },
        // The session keeps its last good state; the caller still gets a turn.
        Err(e) => {
            tracing::error!(session = %session_id, error = %e, "failed to process message");
            let mut history = payload.conversation_history;
            history.push(ConversationMessage::user(message));
            history.push(ConversationMessage::assistant(APOLOGY));
            ChatResponse {
                response: APOLOGY.to_string(),
                session_id,
                conversation_history: history,
                booking_confirmed: false,
                event_id: None,
            }
        }
    };

    Ok(Json(response))
}
