pub mod entities;
pub mod intent;
pub mod providers;
pub mod rules;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Classification, ConversationMessage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// Turns one user message, read against the recent conversation, into an
/// intent plus whatever date/time details it carries.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> anyhow::Result<Classification>;
}
