//! Live poll coordinator.
//!
//! Ties the session registry, the durable store and the broadcast hub
//! together:
//!
//! - **create**: persist, then register, then announce, then arm the timer.
//!   A failed insert leaves nothing behind.
//! - **vote**: validated and applied under the poll's own lock; the durable
//!   record is overwritten as a side effect and a failed write does not undo
//!   the in-memory vote.
//! - **close**: fired once by the timer; flushes the final state with
//!   status `completed` and evicts the session.
//!
//! Timers live only in this process. If the server restarts mid-poll, that
//! poll stays `active` in the store and never auto-closes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use pollroom_shared::poll::CreatePoll;
use pollroom_shared::protocol::{PollAnnouncement, PollSummary, ServerEvent};
use pollroom_shared::{PollError, PollId, Tally};
use pollroom_store::PollStore;

use crate::hub::Hub;
use crate::registry::SessionRegistry;
use crate::session::PollSession;

#[derive(Clone)]
pub struct PollCoordinator {
    registry: SessionRegistry,
    store: Arc<dyn PollStore>,
    hub: Hub,
}

impl PollCoordinator {
    pub fn new(store: Arc<dyn PollStore>, hub: Hub) -> Self {
        Self {
            registry: SessionRegistry::new(),
            store,
            hub,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create a poll and open it for `timer` seconds.
    pub async fn create_poll(&self, request: CreatePoll) -> Result<PollId, PollError> {
        let poll = request.into_poll(PollId::new(), Utc::now())?;
        let id = poll.id;

        if let Err(e) = self.store.create_poll(&poll) {
            error!(poll = %id, error = %e, "Failed to persist new poll");
            return Err(PollError::StoreUnavailable(e.to_string()));
        }

        let announcement = PollAnnouncement::from(&poll);
        let teacher = poll.teacher_username.clone();
        let timer = Duration::from_secs(u64::from(poll.timer));

        self.registry.create(PollSession::new(poll)).await?;

        info!(
            poll = %id,
            teacher = %teacher,
            timer_secs = announcement.timer,
            options = announcement.options.len(),
            "Poll created"
        );

        self.hub.broadcast(ServerEvent::PollCreated(announcement)).await;
        self.arm_timer(id, timer);

        Ok(id)
    }

    fn arm_timer(&self, id: PollId, after: Duration) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            coordinator.close_poll(id).await;
        });
    }

    /// Record one vote and broadcast the new tally.
    pub async fn submit_vote(
        &self,
        poll_id: &str,
        participant: &str,
        option: &str,
    ) -> Result<Tally, PollError> {
        let id = poll_id
            .parse::<PollId>()
            .map_err(|_| PollError::PollNotFound)?;
        let handle = self
            .registry
            .get(id)
            .await
            .ok_or(PollError::PollNotFound)?;

        let mut session = handle.lock().await;
        let tally = session.record_vote(participant, option, Utc::now())?;

        debug!(poll = %id, participant = %participant, option = %option, "Vote accepted");

        // The live tally is authoritative; a failed write is only logged.
        if let Err(e) = self.store.update_poll(session.poll()) {
            error!(poll = %id, error = %e, "Failed to persist vote");
        }

        self.hub
            .broadcast(ServerEvent::PollResults(tally.clone()))
            .await;

        Ok(tally)
    }

    /// Close a poll: persist the final state, evict the session and announce
    /// the final tally. Returns `false` if the poll was not open, which makes
    /// repeated calls harmless.
    pub async fn close_poll(&self, id: PollId) -> bool {
        let Some(handle) = self.registry.get(id).await else {
            debug!(poll = %id, "Close requested for poll that is not open");
            return false;
        };

        let mut session = handle.lock().await;
        if !session.complete(Utc::now()) {
            return false;
        }

        if let Err(e) = self.store.update_poll(session.poll()) {
            error!(poll = %id, error = %e, "Failed to persist final poll results");
        }

        self.registry.remove(id).await;

        let summary = PollSummary::from(session.poll());
        info!(poll = %id, total_votes = summary.total_votes, "Poll ended");

        self.hub.broadcast(ServerEvent::PollEnded(summary)).await;
        true
    }
}
