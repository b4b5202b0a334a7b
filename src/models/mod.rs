pub mod availability;
pub mod booking;
pub mod conversation;
pub mod intent;
pub mod slot;

pub use availability::{DailyWindow, WorkingHoursPolicy};
pub use booking::{CalendarEvent, CalendarInfo, EventId, NewEvent};
pub use conversation::{BookingDraft, Conversation, ConversationMessage, ConversationState};
pub use intent::{Classification, DateHint, Entities, HourRange, Intent, TimePeriod};
pub use slot::{BusyPeriod, CandidateSlot, TimeInterval};
