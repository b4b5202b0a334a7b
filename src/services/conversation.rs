use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::errors::BookingError;
use crate::models::{
    BookingDraft, BusyPeriod, CandidateSlot, Classification, Conversation, ConversationMessage,
    ConversationState, Entities, EventId, Intent, TimeInterval, WorkingHoursPolicy,
};
use crate::services::ai::entities::resolve_date;
use crate::services::booking;
use crate::services::scheduling::{compute_free_slots, requested_window, validate_date};
use crate::state::AppState;

/// Most slots listed in an availability overview.
pub const MAX_LISTED_SLOTS: usize = 20;

/// Most numbered slots offered for a booking request.
pub const MAX_OFFERED_SLOTS: usize = 5;

const EVENT_DESCRIPTION: &str = "Scheduled via booking assistant";

const GREETING: &str = "Hello! I'm your booking assistant. I can help you:\n\n\
    Check your availability for any day\n\
    Schedule meetings and calls\n\
    Book time slots in your calendar\n\n\
    What would you like to do?";

const HELP: &str = "I'm here to help you schedule meetings and check availability. You can say:\n\n\
    • 'Check my availability for tomorrow'\n\
    • 'Schedule a meeting Friday afternoon'\n\
    • 'Book a call for next Monday between 3-5 PM'\n\n\
    What would you like to do?";

const ASK_FOR_DATE: &str = "I'd be happy to help you schedule a meeting! What day would you like to meet? (e.g., 'tomorrow', 'Friday', 'next Monday')";

const CONFIRM_PROMPT: &str = "Please say 'yes' to confirm the booking or 'no' to cancel.";

const CANCELLED: &str = "No problem! The booking has been cancelled. Is there anything else I can help you with?";

const NOTHING_TO_CANCEL: &str = "There's no booking in progress to cancel. Is there anything else I can help you with?";

/// What the transport sends back for one turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub history: Vec<ConversationMessage>,
    pub booking_confirmed: bool,
    pub event_id: Option<EventId>,
}

struct Turn {
    response: String,
    event_id: Option<EventId>,
}

impl Turn {
    fn reply(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            event_id: None,
        }
    }
}

/// Runs one message through the session's conversation.
///
/// Turns of the same session are serialized, and `clock` is read once the
/// turn holds the session. A non-empty `prior_history` from the transport
/// replaces the stored message log. Every recoverable failure becomes a
/// reply and leaves the booking state as it was.
pub async fn process_message(
    state: &AppState,
    session_id: &str,
    message: &str,
    prior_history: Vec<ConversationMessage>,
    clock: impl FnOnce() -> NaiveDateTime,
) -> anyhow::Result<ChatReply> {
    let _turn = state.turn_locks.acquire(session_id).await;
    let now = clock();
    let ttl = state.config.session_ttl();

    let mut conv = state
        .sessions
        .get(session_id, now)
        .unwrap_or_else(|| Conversation::new(session_id, now, ttl));
    if !prior_history.is_empty() {
        conv.messages = prior_history;
    }
    conv.booking_confirmed = false;

    let classification = state.classifier.classify(message, &conv.messages).await?;

    tracing::info!(
        session = session_id,
        intent = classification.intent.as_str(),
        state = conv.state.as_str(),
        "processing message"
    );

    let mut next = conv.clone();
    let turn = match advance(state, &mut next, classification, now).await {
        Ok(turn) => {
            conv = next;
            turn
        }
        Err(e) => {
            match &e {
                BookingError::CalendarQueryFailure(source) | BookingError::CommitFailure(source) => {
                    tracing::warn!(session = session_id, error = %source, "calendar call failed");
                }
                other => {
                    tracing::info!(session = session_id, reason = ?other, "turn recovered");
                }
            }
            Turn::reply(e.to_string())
        }
    };

    conv.messages.push(ConversationMessage::user(message));
    conv.messages.push(ConversationMessage::assistant(&turn.response));
    conv.touch(now, ttl);

    tracing::info!(
        session = session_id,
        state = conv.state.as_str(),
        slots = conv.pending_slots.len(),
        booking_confirmed = conv.booking_confirmed,
        "turn complete"
    );

    let reply = ChatReply {
        response: turn.response,
        history: conv.messages.clone(),
        booking_confirmed: conv.booking_confirmed,
        event_id: turn.event_id,
    };
    state.sessions.put(conv);
    Ok(reply)
}

async fn advance(
    state: &AppState,
    conv: &mut Conversation,
    classification: Classification,
    now: NaiveDateTime,
) -> Result<Turn, BookingError> {
    let Classification { intent, entities } = classification;
    let carried = match conv.state {
        ConversationState::Idle => None,
        _ => conv.draft.date,
    };

    match (conv.state, intent) {
        (_, Intent::Cancellation) => Ok(cancel(conv)),

        (ConversationState::AwaitingConfirmation, Intent::Confirmation { accepted: true }) => {
            commit_selection(state, conv).await
        }
        (ConversationState::AwaitingConfirmation, Intent::Confirmation { accepted: false }) => {
            Ok(cancel(conv))
        }

        (ConversationState::ProposalMade, Intent::SlotSelection { index }) => {
            select_slot(conv, index)
        }
        (_, Intent::SlotSelection { .. }) => Err(BookingError::NoActiveProposal),

        // Any message carrying a time completes the draft.
        (ConversationState::AwaitingTimeDetail, _) if entities.has_time_detail() => {
            let date = resolved_date(&entities, now)?;
            let draft = conv.draft.merged_with(date, &entities);
            propose_slots(state, conv, draft, now).await
        }

        (_, Intent::AvailabilityCheck) => {
            let date = resolved_date(&entities, now)?.or(carried);
            check_availability(state, conv, date.unwrap_or(now.date()), now).await
        }

        (_, Intent::BookingRequest) => {
            let Some(date) = resolved_date(&entities, now)?.or(carried) else {
                return Ok(Turn::reply(ASK_FOR_DATE));
            };
            validate_date(date, now, &state.policy)?;

            let draft = BookingDraft::from_entities(Some(date), &entities);
            if !draft.has_time_detail() {
                conv.reset_booking();
                conv.draft = draft;
                conv.state = ConversationState::AwaitingTimeDetail;
                return Ok(Turn::reply(ask_for_time(date)));
            }
            propose_slots(state, conv, draft, now).await
        }

        (_, Intent::Greeting) => Ok(Turn::reply(GREETING)),

        // A stray yes/no with nothing awaiting confirmation lands here too.
        (_, Intent::Confirmation { .. }) | (_, Intent::Unknown) => Ok(Turn::reply(help_for(conv))),
    }
}

async fn check_availability(
    state: &AppState,
    conv: &mut Conversation,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<Turn, BookingError> {
    validate_date(date, now, &state.policy)?;

    let day = state.policy.working_day(date);
    let busy = busy_periods(state, &day).await?;
    let mut slots = compute_free_slots(day.start, day.end, &busy, &state.policy, now);
    slots.truncate(MAX_LISTED_SLOTS);

    tracing::info!(session = %conv.session_id, date = %date, slots = slots.len(), "availability computed");

    if slots.is_empty() {
        return Err(BookingError::NoSlotsAvailable {
            window: date.format("%A, %B %d").to_string(),
        });
    }

    let response = format_availability(date, &slots);
    let draft = BookingDraft {
        date: Some(date),
        subject: conv.draft.subject.clone(),
        ..BookingDraft::default()
    };
    conv.propose(CandidateSlot::number(slots), draft);
    Ok(Turn::reply(response))
}

async fn propose_slots(
    state: &AppState,
    conv: &mut Conversation,
    draft: BookingDraft,
    now: NaiveDateTime,
) -> Result<Turn, BookingError> {
    let date = draft.date.ok_or(BookingError::DateParseFailure)?;
    validate_date(date, now, &state.policy)?;

    let policy: WorkingHoursPolicy = match draft.duration_minutes {
        Some(minutes) => state.policy.with_duration(minutes),
        None => state.policy.clone(),
    };
    let no_slots = || BookingError::NoSlotsAvailable {
        window: format!("{} {}", date.format("%A, %B %d"), draft.time_label()),
    };

    let window = requested_window(date, &draft, &policy).ok_or_else(no_slots)?;
    let busy = busy_periods(state, &window).await?;
    let mut slots = compute_free_slots(window.start, window.end, &busy, &policy, now);
    slots.truncate(MAX_OFFERED_SLOTS);

    tracing::info!(session = %conv.session_id, date = %date, slots = slots.len(), "slots proposed");

    if slots.is_empty() {
        return Err(no_slots());
    }

    let candidates = CandidateSlot::number(slots);
    let response = format_proposal(date, &candidates);
    conv.propose(candidates, draft);
    Ok(Turn::reply(response))
}

fn select_slot(conv: &mut Conversation, index: usize) -> Result<Turn, BookingError> {
    if conv.pending_slots.is_empty() {
        return Err(BookingError::NoActiveProposal);
    }
    let max = conv.pending_slots.len();
    if index == 0 || index > max {
        return Err(BookingError::OutOfRangeSelection { max });
    }

    let slot = conv.pending_slots[index - 1];
    conv.pending_slots.clear();
    conv.selected_slot = Some(slot);
    conv.state = ConversationState::AwaitingConfirmation;

    Ok(Turn::reply(format!(
        "Perfect! I'll book your {} for:\n\n{}\n{}\n\nShould I confirm this booking? Say 'yes' to confirm or 'no' to cancel.",
        event_title(&conv.draft).to_lowercase(),
        slot.interval.day_label(),
        slot.interval.time_range_label(),
    )))
}

async fn commit_selection(
    state: &AppState,
    conv: &mut Conversation,
) -> Result<Turn, BookingError> {
    let slot = conv.selected_slot.ok_or(BookingError::NoActiveProposal)?;
    let title = event_title(&conv.draft);

    let event_id = booking::commit(
        state.calendar.as_ref(),
        &slot.interval,
        &title,
        EVENT_DESCRIPTION,
    )
    .await?;

    conv.reset_booking();
    conv.booking_confirmed = true;

    Ok(Turn {
        response: format!(
            "Booking confirmed!\n\nYour {} is scheduled for:\n{}\n{}\n\nIt has been added to your calendar.",
            title.to_lowercase(),
            slot.interval.day_label(),
            slot.interval.time_range_label(),
        ),
        event_id: Some(event_id),
    })
}

fn cancel(conv: &mut Conversation) -> Turn {
    if !conv.has_booking_in_progress() {
        return Turn::reply(NOTHING_TO_CANCEL);
    }
    conv.reset_booking();
    Turn::reply(CANCELLED)
}

async fn busy_periods(
    state: &AppState,
    window: &TimeInterval,
) -> Result<Vec<BusyPeriod>, BookingError> {
    state
        .calendar
        .query_busy(window.start, window.end)
        .await
        .map_err(BookingError::CalendarQueryFailure)
}

fn resolved_date(entities: &Entities, now: NaiveDateTime) -> Result<Option<NaiveDate>, BookingError> {
    match entities.date {
        Some(hint) => resolve_date(hint, now.date())
            .map(Some)
            .ok_or(BookingError::DateParseFailure),
        None => Ok(None),
    }
}

fn event_title(draft: &BookingDraft) -> String {
    draft.subject.clone().unwrap_or_else(|| "Meeting".to_string())
}

fn ask_for_time(date: NaiveDate) -> String {
    format!(
        "Great! For {}, what time works best? (e.g., 'morning', '2 PM', 'between 3-5 PM')",
        date.format("%A, %B %d")
    )
}

fn help_for(conv: &Conversation) -> String {
    match conv.state {
        ConversationState::AwaitingTimeDetail => match conv.draft.date {
            Some(date) => ask_for_time(date),
            None => HELP.to_string(),
        },
        ConversationState::ProposalMade if conv.draft.has_time_detail() => format!(
            "Which slot works for you? Reply with the number (1-{}), or say 'cancel' to start over.",
            conv.pending_slots.len()
        ),
        ConversationState::AwaitingConfirmation => CONFIRM_PROMPT.to_string(),
        _ => HELP.to_string(),
    }
}

/// Slots grouped into Morning (before 12:00), Afternoon (12:00-17:00) and
/// Evening (from 17:00).
fn format_availability(date: NaiveDate, slots: &[TimeInterval]) -> String {
    let mut response = format!("Here's your availability for {}:\n\n", date.format("%A, %B %d"));

    let bands: [(&str, fn(u32) -> bool); 3] = [
        ("Morning", |h| h < 12),
        ("Afternoon", |h| (12..17).contains(&h)),
        ("Evening", |h| h >= 17),
    ];
    for (name, in_band) in bands {
        let band: Vec<_> = slots.iter().filter(|s| in_band(s.start.hour())).collect();
        if band.is_empty() {
            continue;
        }
        response.push_str(name);
        response.push_str(":\n");
        for slot in band {
            response.push_str(&format!("  • {}\n", slot.time_range_label()));
        }
        response.push('\n');
    }

    response.push_str("Would you like to book any of these times?");
    response
}

fn format_proposal(date: NaiveDate, slots: &[CandidateSlot]) -> String {
    let mut response = format!("I found available slots for {}:\n\n", date.format("%A, %B %d"));
    for slot in slots {
        response.push_str(&format!("{}. {}\n", slot.index, slot.interval.time_range_label()));
    }
    response.push_str(&format!(
        "\nWhich slot works for you? Reply with the number (1-{}).",
        slots.len()
    ));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::config::AppConfig;
    use crate::models::{CalendarEvent, CalendarInfo, NewEvent};
    use crate::services::ai::rules::RuleClassifier;
    use crate::services::calendar::CalendarBackend;
    use crate::services::session::{InMemorySessionStore, TurnLocks};

    /// Calendar with fixed busy periods that records every call.
    #[derive(Default)]
    struct FakeCalendar {
        busy: Vec<BusyPeriod>,
        queries: AtomicUsize,
        created: Mutex<Vec<NewEvent>>,
        fail_create: AtomicBool,
        fail_query: bool,
    }

    #[async_trait]
    impl CalendarBackend for FakeCalendar {
        async fn query_busy(
            &self,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> anyhow::Result<Vec<BusyPeriod>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_query {
                anyhow::bail!("token expired");
            }
            Ok(self.busy.clone())
        }

        async fn create_event(&self, event: &NewEvent) -> anyhow::Result<EventId> {
            if self.fail_create.load(Ordering::SeqCst) {
                anyhow::bail!("calendar unavailable");
            }
            let mut created = self.created.lock().unwrap();
            created.push(event.clone());
            Ok(format!("evt-{}", created.len()))
        }

        async fn get_event(&self, _id: &str) -> anyhow::Result<Option<CalendarEvent>> {
            Ok(None)
        }

        async fn info(&self) -> CalendarInfo {
            CalendarInfo {
                backend: "fake".to_string(),
                calendar: "fake".to_string(),
                timezone: "UTC".to_string(),
                connected: true,
            }
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn busy(start: &str, end: &str) -> BusyPeriod {
        BusyPeriod::new(TimeInterval::new(dt(start), dt(end)).unwrap(), None)
    }

    fn app(calendar: FakeCalendar, policy: WorkingHoursPolicy) -> (AppState, Arc<FakeCalendar>) {
        let calendar = Arc::new(calendar);
        let state = AppState {
            config: AppConfig::default(),
            policy,
            timezone: chrono_tz::UTC,
            classifier: Box::new(RuleClassifier::new().unwrap()),
            calendar: calendar.clone(),
            sessions: Box::new(InMemorySessionStore::new()),
            turn_locks: TurnLocks::new(),
        };
        (state, calendar)
    }

    fn nine_to_five() -> WorkingHoursPolicy {
        WorkingHoursPolicy {
            end_hour: 17,
            ..WorkingHoursPolicy::default()
        }
    }

    async fn say(state: &AppState, message: &str, now: NaiveDateTime) -> ChatReply {
        process_message(state, "s1", message, vec![], || now).await.unwrap()
    }

    fn session(state: &AppState, now: NaiveDateTime) -> Conversation {
        state.sessions.get("s1", now).unwrap()
    }

    // 2026-10-19 is a Monday.

    #[tokio::test]
    async fn test_weekend_availability_is_refused() {
        let (state, calendar) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "Check my availability for saturday", now).await;
        assert!(reply.response.contains("don't have work slots"));
        assert!(reply.response.contains("Saturday, October 24"));

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::Idle);
        assert!(conv.pending_slots.is_empty());
        assert_eq!(calendar.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_availability_groups_slots_into_bands() {
        let (state, _) = app(
            FakeCalendar {
                busy: vec![busy("2026-10-20 09:00", "2026-10-20 14:00")],
                ..FakeCalendar::default()
            },
            WorkingHoursPolicy::default(),
        );
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "What's my availability tomorrow?", now).await;
        assert!(reply.response.starts_with("Here's your availability for Tuesday, October 20"));
        assert!(!reply.response.contains("Morning:"));
        assert!(reply.response.contains("Afternoon:\n  • 02:00 PM - 03:00 PM"));
        assert!(reply.response.contains("Evening:\n  • 05:00 PM - 06:00 PM"));

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::ProposalMade);
        assert_eq!(conv.pending_slots[0].interval.start, dt("2026-10-20 14:00"));
    }

    #[tokio::test]
    async fn test_today_after_close_is_refused_without_engine_call() {
        let (state, calendar) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 18:30");

        let reply = say(&state, "Book a meeting today", now).await;
        assert!(reply.response.contains("work day has ended"));
        assert!(reply.response.contains("6:00 PM"));
        assert_eq!(calendar.queries.load(Ordering::SeqCst), 0);
        assert_eq!(session(&state, now).state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_morning_request_skips_busy_hour() {
        let (state, _) = app(
            FakeCalendar {
                busy: vec![busy("2026-10-20 09:00", "2026-10-20 10:00")],
                ..FakeCalendar::default()
            },
            nine_to_five(),
        );
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "Book a meeting tomorrow morning", now).await;
        assert!(reply.response.contains("1. 10:00 AM - 11:00 AM"));
        assert!(reply.response.contains("Reply with the number (1-3)"));

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::ProposalMade);
        assert_eq!(conv.pending_slots.len(), 3);
        assert_eq!(conv.pending_slots[0].interval.start, dt("2026-10-20 10:00"));
    }

    #[tokio::test]
    async fn test_missing_date_prompts_and_stays_idle() {
        let (state, _) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "I want to schedule a call", now).await;
        assert!(reply.response.contains("What day would you like to meet?"));
        assert_eq!(session(&state, now).state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_time_detail_follow_up_completes_draft() {
        let (state, _) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "Schedule a call on friday", now).await;
        assert!(reply.response.contains("Friday, October 23"));
        assert!(reply.response.contains("what time works best"));
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::AwaitingTimeDetail);
        assert_eq!(conv.draft.subject.as_deref(), Some("Call"));

        let reply = say(&state, "between 3 and 5", now).await;
        assert!(reply.response.contains("1. 03:00 PM - 04:00 PM"));
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::ProposalMade);
        assert_eq!(conv.pending_slots.len(), 3);
        assert_eq!(conv.draft.subject.as_deref(), Some("Call"));
    }

    #[tokio::test]
    async fn test_time_detail_phrased_as_question_keeps_draft() {
        let (state, _) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 10:00");

        say(&state, "Schedule a call on friday", now).await;
        let reply = say(&state, "when am I free in the afternoon?", now).await;
        assert!(reply.response.starts_with("I found available slots for Friday, October 23"));

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::ProposalMade);
        assert_eq!(conv.draft.date, NaiveDate::from_ymd_opt(2026, 10, 23));
        assert_eq!(conv.draft.subject.as_deref(), Some("Call"));
        assert_eq!(conv.pending_slots[0].interval.start, dt("2026-10-23 13:00"));
    }

    #[tokio::test]
    async fn test_availability_without_date_uses_draft_date() {
        let (state, _) = app(FakeCalendar::default(), WorkingHoursPolicy::default());
        let now = dt("2026-10-19 10:00");

        say(&state, "Schedule a call on friday", now).await;
        let reply = say(&state, "show me my availability", now).await;
        assert!(reply.response.starts_with("Here's your availability for Friday, October 23"));

        let conv = session(&state, now);
        assert_eq!(conv.draft.date, NaiveDate::from_ymd_opt(2026, 10, 23));
        assert_eq!(conv.draft.subject.as_deref(), Some("Call"));
    }

    #[tokio::test]
    async fn test_impossible_date_does_not_block_cancel_or_selection() {
        let (state, _) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Schedule a call on friday", now).await;
        let reply = say(&state, "never mind, 2/30", now).await;
        assert_eq!(reply.response, CANCELLED);
        assert_eq!(session(&state, now).state, ConversationState::Idle);

        say(&state, "Book a meeting tomorrow afternoon", now).await;
        say(&state, "1, not 2/30", now).await;
        assert_eq!(session(&state, now).state, ConversationState::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_out_of_range_selection_keeps_proposal() {
        let (state, _) = app(
            FakeCalendar {
                busy: vec![busy("2026-10-20 09:00", "2026-10-20 10:00")],
                ..FakeCalendar::default()
            },
            nine_to_five(),
        );
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow morning", now).await;
        let before = session(&state, now);

        let reply = say(&state, "5", now).await;
        assert!(reply.response.contains("between 1 and 3"));

        let after = session(&state, now);
        assert_eq!(after.state, ConversationState::ProposalMade);
        assert_eq!(after.pending_slots, before.pending_slots);

        // The re-prompt still asks for a number, so a valid pick goes through.
        say(&state, "2", now).await;
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::AwaitingConfirmation);
        assert_eq!(conv.selected_slot.unwrap().interval.start, dt("2026-10-20 10:30"));
        assert!(conv.pending_slots.is_empty());
    }

    #[tokio::test]
    async fn test_declining_resets_to_idle() {
        let (state, calendar) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow afternoon", now).await;
        say(&state, "1", now).await;
        assert_eq!(session(&state, now).state, ConversationState::AwaitingConfirmation);

        let reply = say(&state, "no", now).await;
        assert!(reply.response.contains("cancelled"));
        assert!(!reply.booking_confirmed);

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::Idle);
        assert!(conv.pending_slots.is_empty());
        assert!(conv.selected_slot.is_none());
        assert_eq!(conv.draft, BookingDraft::default());
        assert!(calendar.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_commits_once() {
        let (state, calendar) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow at 2pm", now).await;
        say(&state, "1", now).await;

        let reply = say(&state, "yes", now).await;
        assert!(reply.booking_confirmed);
        assert_eq!(reply.event_id.as_deref(), Some("evt-1"));
        assert!(reply.response.contains("Tuesday, October 20"));
        assert!(reply.response.contains("02:00 PM - 03:00 PM"));

        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::Idle);
        assert!(conv.selected_slot.is_none());

        // A second "yes" finds nothing awaiting confirmation.
        let reply = say(&state, "yes", now).await;
        assert!(!reply.booking_confirmed);
        assert!(reply.event_id.is_none());
        assert_eq!(calendar.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_booking_request_right_after_commit() {
        let (state, calendar) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow at 2pm", now).await;
        say(&state, "1", now).await;
        assert!(say(&state, "yes", now).await.booking_confirmed);

        let reply = say(&state, "ok, now book a call tomorrow at 3pm", now).await;
        assert!(reply.response.contains("1. 03:00 PM - 04:00 PM"));
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::ProposalMade);
        assert_eq!(conv.draft.subject.as_deref(), Some("Call"));
        assert_eq!(calendar.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_selection_for_retry() {
        let (state, calendar) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow at 2pm", now).await;
        say(&state, "1", now).await;

        calendar.fail_create.store(true, Ordering::SeqCst);
        let reply = say(&state, "yes", now).await;
        assert!(reply.response.contains("error creating the calendar event"));
        assert!(!reply.booking_confirmed);
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::AwaitingConfirmation);
        assert!(conv.selected_slot.is_some());

        calendar.fail_create.store(false, Ordering::SeqCst);
        let reply = say(&state, "yes", now).await;
        assert!(reply.booking_confirmed);
        assert_eq!(calendar.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_calendar_failure_leaves_state_untouched() {
        let (state, _) = app(
            FakeCalendar {
                fail_query: true,
                ..FakeCalendar::default()
            },
            WorkingHoursPolicy::default(),
        );
        let now = dt("2026-10-19 10:00");

        let reply = say(&state, "Book a meeting tomorrow morning", now).await;
        assert!(reply.response.contains("trouble checking availability"));
        let conv = session(&state, now);
        assert_eq!(conv.state, ConversationState::Idle);
        assert_eq!(conv.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_message_keeps_proposal() {
        let (state, _) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "Book a meeting tomorrow afternoon", now).await;
        let reply = say(&state, "hmm, what do you think", now).await;
        assert!(reply.response.contains("Which slot works for you?"));
        assert_eq!(session(&state, now).state, ConversationState::ProposalMade);

        let reply = say(&state, "hello", now).await;
        assert!(reply.response.starts_with("Hello!"));
        assert_eq!(session(&state, now).state, ConversationState::ProposalMade);
    }

    #[tokio::test]
    async fn test_transport_history_replaces_stored_log() {
        let (state, _) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");

        say(&state, "hello", now).await;
        let history = vec![ConversationMessage::assistant("Welcome back.")];
        let reply = process_message(&state, "s1", "hi", history, || now).await.unwrap();

        assert_eq!(reply.history.len(), 3);
        assert_eq!(reply.history[0].content, "Welcome back.");
        assert_eq!(reply.history[1], ConversationMessage::user("hi"));
    }

    #[tokio::test]
    async fn test_clock_is_read_once_turn_holds_session() {
        let (state, _) = app(FakeCalendar::default(), nine_to_five());
        let now = dt("2026-10-19 10:00");
        let clock_read = AtomicBool::new(false);

        let held = state.turn_locks.acquire("s1").await;
        let turn = process_message(&state, "s1", "hello", vec![], || {
            clock_read.store(true, Ordering::SeqCst);
            now
        });
        tokio::pin!(turn);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), &mut turn).await;
        assert!(waited.is_err());
        assert!(!clock_read.load(Ordering::SeqCst));

        drop(held);
        let reply = turn.await.unwrap();
        assert!(clock_read.load(Ordering::SeqCst));
        assert!(reply.response.starts_with("Hello!"));
    }

    #[test]
    fn test_proposal_lists_numbered_slots() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let slots = CandidateSlot::number([
            TimeInterval::new(dt("2026-10-20 09:00"), dt("2026-10-20 10:00")).unwrap(),
            TimeInterval::new(dt("2026-10-20 09:30"), dt("2026-10-20 10:30")).unwrap(),
        ]);
        let text = format_proposal(date, &slots);
        assert!(text.starts_with("I found available slots for Tuesday, October 20"));
        assert!(text.contains("2. 09:30 AM - 10:30 AM"));
        assert!(text.ends_with("Reply with the number (1-2)."));
    }
}
