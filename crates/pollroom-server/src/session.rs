//! One live poll: vote acquisition and tally maintenance.
//!
//! A session starts as an exact copy of the freshly persisted poll record and
//! moves `Active -> Completed` exactly once. After completion every vote is
//! refused as if the poll did not exist.

use chrono::{DateTime, Utc};

use pollroom_shared::{Poll, PollError, PollId, PollStatus, Tally};

#[derive(Debug)]
pub struct PollSession {
    poll: Poll,
    closed: bool,
}

impl PollSession {
    pub fn new(poll: Poll) -> Self {
        Self {
            poll,
            closed: false,
        }
    }

    pub fn id(&self) -> PollId {
        self.poll.id
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    /// Accept one vote and return the resulting full tally.
    ///
    /// Option text is matched exactly, first declared option wins. On any
    /// error the session is left untouched.
    pub fn record_vote(
        &mut self,
        participant: &str,
        option: &str,
        now: DateTime<Utc>,
    ) -> Result<Tally, PollError> {
        if self.closed {
            return Err(PollError::PollNotFound);
        }
        if participant.trim().is_empty() {
            return Err(PollError::validation("username is required to vote"));
        }
        if self.poll.votes.contains_key(participant) {
            return Err(PollError::DuplicateVote);
        }

        let index = self
            .poll
            .options
            .iter()
            .position(|o| o.text == option)
            .ok_or_else(|| PollError::InvalidOption(option.to_string()))?;

        self.poll
            .votes
            .insert(participant.to_string(), option.to_string());
        self.poll.options[index].votes += 1;
        self.poll.total_votes += 1;
        self.poll.updated_at = now;

        debug_assert!(self.poll.is_consistent());

        Ok(self.poll.tally())
    }

    /// Freeze the session. Returns `false` if it was already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.poll.status = PollStatus::Completed;
        self.poll.updated_at = now;
        true
    }
}
