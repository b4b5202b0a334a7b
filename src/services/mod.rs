pub mod ai;
pub mod booking;
pub mod calendar;
pub mod conversation;
pub mod scheduling;
pub mod session;
