//! Participant identities.
//!
//! There are no credentials in this system. A teacher is whoever holds a
//! username minted by the login stub, and moderation rights are granted by
//! looking at the username prefix alone. Treat [`is_teacher`] as a UI hint,
//! not an access control.

use chrono::{DateTime, Utc};

use crate::constants::TEACHER_PREFIX;

/// Capability check for moderation actions (kicking participants).
pub fn is_teacher(identity: &str) -> bool {
    identity.starts_with(TEACHER_PREFIX)
}

/// Mint a teacher username from a timestamp, e.g. `teacher_1718000000000`.
pub fn teacher_username(now: DateTime<Utc>) -> String {
    format!("{}_{}", TEACHER_PREFIX, now.timestamp_millis())
}
