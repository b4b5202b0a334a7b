//! Keyword classifier. Checks run in a fixed order and the first match wins;
//! later checks assume the earlier ones failed.

use async_trait::async_trait;
use regex::Regex;

use super::entities::EntityExtractor;
use super::IntentClassifier;
use crate::models::{Classification, ConversationMessage, Intent};

/// Phrases in an assistant reply that ask the user to pick a numbered slot.
pub const SLOT_PROMPT_MARKERS: [&str; 2] = ["which slot", "reply with the number"];

/// Phrases in an assistant reply that ask the user to confirm a booking.
pub const CONFIRM_PROMPT_MARKERS: [&str; 2] = ["confirm", "say yes"];

/// How many trailing turns are searched for the last assistant message.
const LOOKBACK_TURNS: usize = 3;

pub struct RuleClassifier {
    entities: EntityExtractor,
    slot_digit: Regex,
    yes_words: Regex,
    no_words: Regex,
    cancellation: Regex,
    greeting: Regex,
    availability: Vec<Regex>,
    booking: Vec<Regex>,
}

impl RuleClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            entities: EntityExtractor::new()?,
            slot_digit: Regex::new(r"\b([1-9])\b")?,
            yes_words: Regex::new(r"\b(yes|confirm|confirmed)\b")?,
            no_words: Regex::new(r"\b(no|cancel)\b")?,
            cancellation: Regex::new(r"\b(cancel|never\s?mind|start over|forget it)\b")?,
            greeting: Regex::new(r"\b(hi|hello|hey|good (morning|afternoon|evening))\b")?,
            availability: vec![
                Regex::new(r"\b(check|show|see|what|when)\b.*\b(availability|available|free|time)\b")?,
                Regex::new(r"\b(availability|available|free)\b.*\b(today|tomorrow|monday|tuesday|wednesday|thursday|friday)\b")?,
                Regex::new(r"\b(do you have|any)\b.*\b(free time|available|open)\b")?,
                Regex::new(r"\bfree time\b.*\bon\b")?,
                Regex::new(r"\bavailable\b.*\bon\b")?,
            ],
            booking: vec![
                Regex::new(r"\b(schedule|book|set up|arrange)\b.*\b(meeting|call|appointment)\b")?,
                Regex::new(r"\b(want to|need to|would like to)\b.*\b(schedule|book|meet)\b")?,
                Regex::new(r"\bbook\b.*\bmeeting\b")?,
                Regex::new(r"\bschedule\b.*\bcall\b")?,
                Regex::new(r"\bmeeting\b.*\bbetween\b")?,
                Regex::new(r"\bcall\b.*\btomorrow\b")?,
            ],
        })
    }

    pub fn evaluate(&self, message: &str, history: &[ConversationMessage]) -> Classification {
        let text = message.to_lowercase();
        Classification {
            intent: self.intent(&text, history),
            entities: self.entities.extract(message),
        }
    }

    fn intent(&self, text: &str, history: &[ConversationMessage]) -> Intent {
        let last_reply = last_assistant_message(history);

        if SLOT_PROMPT_MARKERS.iter().any(|m| last_reply.contains(m)) {
            if let Some(index) = self
                .slot_digit
                .captures(text)
                .and_then(|c| c[1].parse().ok())
            {
                return Intent::SlotSelection { index };
            }
        }

        if CONFIRM_PROMPT_MARKERS.iter().any(|m| last_reply.contains(m)) {
            let yes = self.yes_words.is_match(text);
            let no = self.no_words.is_match(text);
            if yes || no {
                return Intent::Confirmation { accepted: yes && !no };
            }
        }

        if self.cancellation.is_match(text) {
            return Intent::Cancellation;
        }
        if self.availability.iter().any(|p| p.is_match(text)) {
            return Intent::AvailabilityCheck;
        }
        if self.booking.iter().any(|p| p.is_match(text)) {
            return Intent::BookingRequest;
        }
        if self.greeting.is_match(text) {
            return Intent::Greeting;
        }
        Intent::Unknown
    }
}

#[async_trait]
impl IntentClassifier for RuleClassifier {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> anyhow::Result<Classification> {
        Ok(self.evaluate(message, history))
    }
}

fn last_assistant_message(history: &[ConversationMessage]) -> String {
    history
        .iter()
        .rev()
        .take(LOOKBACK_TURNS)
        .find(|m| m.role == "assistant")
        .map(|m| m.content.to_lowercase())
        .unwrap_or_default()
}
