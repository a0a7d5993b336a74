//! Session registry: the authoritative index of polls that still accept
//! votes.
//!
//! A poll's durable `status` lags behind this map; only the registry may
//! answer "is this poll open".

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use pollroom_shared::{PollError, PollId};

use crate::session::PollSession;

/// Per-poll lock. Every mutation of a session happens while holding it.
pub type SessionHandle = Arc<Mutex<PollSession>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<PollId, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live session. A second session for the same id is
    /// refused rather than replacing the first.
    pub async fn create(&self, session: PollSession) -> Result<SessionHandle, PollError> {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        match sessions.entry(id) {
            Entry::Occupied(_) => Err(PollError::DuplicatePoll(id)),
            Entry::Vacant(slot) => {
                let handle = Arc::new(Mutex::new(session));
                slot.insert(handle.clone());
                debug!(poll = %id, live = sessions.len(), "Registered poll session");
                Ok(handle)
            }
        }
    }

    pub async fn get(&self, id: PollId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: PollId) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            debug!(poll = %id, "Evicted poll session");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn active_ids(&self) -> Vec<PollId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pollroom_shared::poll::{CreatePoll, OptionDraft};

    fn new_session() -> PollSession {
        let draft = CreatePoll {
            question: "Ready?".into(),
            options: vec![
                OptionDraft { text: "yes".into(), correct: true },
                OptionDraft { text: "no".into(), correct: false },
            ],
            timer: 45,
            teacher_username: "teacher_1".into(),
        };
        PollSession::new(draft.into_poll(PollId::new(), Utc::now()).unwrap())
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = SessionRegistry::new();
        let session = new_session();
        let id = session.id();

        registry.create(session).await.unwrap();
        assert_eq!(registry.active_ids().await, vec![id]);

        let handle = registry.get(id).await.unwrap();
        assert_eq!(handle.lock().await.id(), id);

        assert!(registry.remove(id).await.is_some());
        assert!(registry.get(id).await.is_none());
        assert!(registry.remove(id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_refused() {
        let registry = SessionRegistry::new();
        let session = new_session();
        let id = session.id();
        let twin = PollSession::new(session.poll().clone());

        let original = registry.create(session).await.unwrap();
        original
            .lock()
            .await
            .record_vote("alice", "yes", Utc::now())
            .unwrap();

        assert_eq!(registry.create(twin).await.err(), Some(PollError::DuplicatePoll(id)));

        // The original session, with its vote, is still the registered one.
        let handle = registry.get(id).await.unwrap();
        assert_eq!(handle.lock().await.poll().total_votes, 1);
    }
}
