use thiserror::Error;

use crate::types::PollId;

/// Reasons a poll operation is rejected.
///
/// The `Display` text is what the originating client sees in its `error`
/// event, so keep it human readable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Invalid poll: {0}")]
    Validation(String),

    #[error("Poll not found or expired")]
    PollNotFound,

    #[error("You have already voted")]
    DuplicateVote,

    #[error("Unknown option: {0}")]
    InvalidOption(String),

    #[error("Storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Only teachers can do that")]
    Unauthorized,

    #[error("Poll {0} is already live")]
    DuplicatePoll(PollId),

    #[error("Malformed event: {0}")]
    Malformed(String),
}

impl PollError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
