//! # pollroom-shared
//!
//! Types shared by the Pollroom store and server: the poll domain model,
//! creation input validation, the WebSocket event protocol, and the
//! moderation capability check.

pub mod constants;
pub mod error;
pub mod identity;
pub mod poll;
pub mod protocol;
pub mod types;

pub use error::PollError;
pub use types::{Poll, PollId, PollOption, PollStatus, Tally, Teacher};
