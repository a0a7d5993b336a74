//! WebSocket wire protocol.
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": <payload>}`.
//! Payloads have fixed schemas; anything that does not parse is rejected at
//! the connection boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::poll::CreatePoll;
use crate::types::{Poll, PollId, PollOption, Tally};

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Enter the chat room and the participant roster.
    JoinChat { username: String },

    /// Free-form chat payload, relayed with a server timestamp and id.
    ChatMessage(Map<String, Value>),

    CreatePoll(CreatePoll),

    SubmitAnswer(SubmitAnswer),

    /// Username of the participant to remove.
    KickOut(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    pub username: String,
    pub option: String,
    pub poll_id: String,
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat { .. } => "joinChat",
            ClientEvent::ChatMessage(_) => "chatMessage",
            ClientEvent::CreatePoll(_) => "createPoll",
            ClientEvent::SubmitAnswer(_) => "submitAnswer",
            ClientEvent::KickOut(_) => "kickOut",
        }
    }
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    PollCreated(PollAnnouncement),

    /// Full tally snapshot after an accepted vote.
    PollResults(Tally),

    /// Final tally once the voting window has closed.
    PollEnded(PollSummary),

    ParticipantsUpdate(Vec<String>),

    ChatHistory(Vec<ChatEntry>),

    ChatMessage(ChatEntry),

    Error { message: String },

    KickedOut,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollAnnouncement {
    #[serde(rename = "_id")]
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub timer: u32,
}

impl From<&Poll> for PollAnnouncement {
    fn from(poll: &Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.question.clone(),
            options: poll.options.clone(),
            timer: poll.timer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    #[serde(rename = "_id")]
    pub id: PollId,
    pub results: Tally,
    pub total_votes: u32,
}

impl From<&Poll> for PollSummary {
    fn from(poll: &Poll) -> Self {
        Self {
            id: poll.id,
            results: poll.tally(),
            total_votes: poll.total_votes,
        }
    }
}

/// A relayed chat message: the sender's fields plus server-assigned
/// `timestamp` and `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
}

impl ChatEntry {
    /// Stamp a client payload. Client-supplied `timestamp`/`id` are replaced.
    pub fn stamp(mut fields: Map<String, Value>, now: DateTime<Utc>) -> Self {
        fields.remove("timestamp");
        fields.remove("id");
        Self {
            fields,
            timestamp: now,
            id: Uuid::new_v4(),
        }
    }
}
