use async_trait::async_trait;
use serde::Deserialize;

use super::entities::EntityExtractor;
use super::rules::RuleClassifier;
use super::{IntentClassifier, LlmProvider, Message};
use crate::models::{Classification, ConversationMessage, Entities, HourRange, Intent, TimePeriod};

const SYSTEM_PROMPT: &str = r#"You are an intent classifier for a calendar booking assistant. Analyze the user's latest message in the context of the conversation history.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "intent": "greeting|availability_check|booking_request|slot_selection|confirmation|cancellation|unknown",
  "slot_index": 2,
  "accepted": true,
  "date": "today, tomorrow, a weekday like next friday, or YYYY-MM-DD, or null",
  "time": "clock time like 14:00 or null",
  "time_period": "morning|afternoon|evening or null",
  "time_range": [15, 17],
  "duration_minutes": 60
}

Intent rules:
- "slot_selection": ONLY when the assistant's last message listed numbered slots and asked the user to reply with a number; set slot_index
- "confirmation": ONLY when the assistant's last message asked the user to confirm; accepted is false if the user says no or cancel
- "availability_check": the user asks when they are free or what their availability is
- "booking_request": the user wants to schedule, book or arrange a meeting or call
- "cancellation": the user wants to abandon the booking in progress
- "greeting": hello, hi, hey
- "unknown": anything else

Use null for any field that does not apply. time_range holds whole 24-hour clock hours.
"#;

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    slot_index: Option<usize>,
    #[serde(default)]
    accepted: Option<bool>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    time_period: Option<String>,
    #[serde(default)]
    time_range: Option<(u32, u32)>,
    #[serde(default)]
    duration_minutes: Option<i64>,
}

/// Model-backed classifier. Falls back to the keyword rules whenever the
/// provider fails or answers with something unusable.
pub struct LlmClassifier {
    llm: Box<dyn LlmProvider>,
    rules: RuleClassifier,
    entities: EntityExtractor,
}

impl LlmClassifier {
    pub fn new(llm: Box<dyn LlmProvider>) -> Result<Self, regex::Error> {
        Ok(Self {
            llm,
            rules: RuleClassifier::new()?,
            entities: EntityExtractor::new()?,
        })
    }

    fn interpret(&self, raw: RawClassification, message: &str) -> Classification {
        let intent = match raw.intent.as_str() {
            "greeting" => Intent::Greeting,
            "availability_check" => Intent::AvailabilityCheck,
            "booking_request" => Intent::BookingRequest,
            "slot_selection" => match raw.slot_index {
                Some(index) if index >= 1 => Intent::SlotSelection { index },
                _ => Intent::Unknown,
            },
            "confirmation" => match raw.accepted {
                Some(accepted) => Intent::Confirmation { accepted },
                None => Intent::Unknown,
            },
            "cancellation" => Intent::Cancellation,
            _ => Intent::Unknown,
        };

        // Start from what the text itself says; the model's fields refine it.
        let mut entities: Entities = self.entities.extract(message);
        if let Some(date) = raw.date.as_deref().and_then(|d| self.entities.extract_date(d)) {
            entities.date = Some(date);
        }
        if let Some(time) = raw.time.as_deref().and_then(|t| self.entities.extract_time(t)) {
            entities.time = Some(time);
        }
        if let Some(period) = raw.time_period.as_deref().and_then(TimePeriod::parse) {
            entities.time_period = Some(period);
        }
        if let Some((start_hour, end_hour)) = raw.time_range {
            if start_hour < end_hour && end_hour <= 24 {
                entities.time_range = Some(HourRange {
                    start_hour,
                    end_hour,
                });
            }
        }
        if let Some(minutes) = raw.duration_minutes.filter(|m| (5..=480).contains(m)) {
            entities.duration_minutes = Some(minutes);
        }

        Classification { intent, entities }
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> anyhow::Result<Classification> {
        let mut messages: Vec<Message> = history
            .iter()
            .map(|m| Message {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();

        messages.push(Message {
            role: "user".to_string(),
            content: message.to_string(),
        });

        let response = match self.llm.chat(SYSTEM_PROMPT, &messages).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "LLM classifier unavailable, using keyword rules");
                return Ok(self.rules.evaluate(message, history));
            }
        };

        match parse_intent_response(&response) {
            Some(raw) => Ok(self.interpret(raw, message)),
            None => {
                tracing::warn!("failed to parse LLM response as intent JSON, using keyword rules");
                Ok(self.rules.evaluate(message, history))
            }
        }
    }
}

fn parse_intent_response(response: &str) -> Option<RawClassification> {
    if let Ok(raw) = serde_json::from_str::<RawClassification>(response) {
        return Some(raw);
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(raw) = serde_json::from_str::<RawClassification>(cleaned) {
        return Some(raw);
    }

    // Try to find JSON object in the response
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if start > end {
        return None;
    }
    serde_json::from_str::<RawClassification>(&cleaned[start..=end]).ok()
}
