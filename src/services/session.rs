use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use tokio::sync::OwnedMutexGuard;

use crate::models::Conversation;

/// Where conversations live between turns, keyed by session id.
pub trait SessionStore: Send + Sync {
    /// The live conversation for `session_id`, or `None` if there is none
    /// or it has expired by `now`.
    fn get(&self, session_id: &str, now: NaiveDateTime) -> Option<Conversation>;

    fn put(&self, conversation: Conversation);

    /// Drops every conversation idle past its expiry. Returns how many went.
    fn purge_expired(&self, now: NaiveDateTime) -> usize;
}

/// Process-local sessions. Nothing survives a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Conversation>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str, now: NaiveDateTime) -> Option<Conversation> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(session_id)?.expires_at <= now {
            tracing::debug!(session = session_id, "session expired");
            sessions.remove(session_id);
            return None;
        }
        sessions.get(session_id).cloned()
    }

    fn put(&self, conversation: Conversation) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.session_id.clone(), conversation);
    }

    fn purge_expired(&self, now: NaiveDateTime) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, conv| conv.expires_at > now);
        before - sessions.len()
    }
}

/// One async lock per session so a session's turns run one at a time.
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forgets locks nobody holds or waits on.
    pub fn release_idle(&self) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_get_returns_stored_conversation() {
        let store = InMemorySessionStore::new();
        store.put(Conversation::new("s1", at("2026-10-19 10:00"), Duration::minutes(30)));

        assert!(store.get("s1", at("2026-10-19 10:10")).is_some());
        assert!(store.get("s2", at("2026-10-19 10:10")).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = InMemorySessionStore::new();
        store.put(Conversation::new("s1", at("2026-10-19 10:00"), Duration::minutes(30)));

        assert!(store.get("s1", at("2026-10-19 10:30")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemorySessionStore::new();
        store.put(Conversation::new("old", at("2026-10-19 09:00"), Duration::minutes(30)));
        store.put(Conversation::new("new", at("2026-10-19 10:00"), Duration::minutes(30)));

        assert_eq!(store.purge_expired(at("2026-10-19 10:05")), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_turns_in_one_session_are_sequential() {
        let locks = Arc::new(TurnLocks::new());
        let guard = locks.acquire("s1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _turn = locks.acquire("s1").await;
            })
        };
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different session is not held up.
        let _other = locks.acquire("s2").await;

        drop(guard);
        waiter.await.unwrap();

        drop(_other);
        locks.release_idle();
        assert!(locks.locks.lock().unwrap().is_empty());
    }
}
