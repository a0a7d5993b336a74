use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-option vote counts keyed by option text.
pub type Tally = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PollId(pub Uuid);

impl PollId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PollId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Completed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Completed => "completed",
        }
    }
}

impl FromStr for PollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PollStatus::Active),
            "completed" => Ok(PollStatus::Completed),
            other => Err(format!("unknown poll status: {other}")),
        }
    }
}

/// One answer choice. `votes` only ever grows while the poll is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub correct: bool,
    #[serde(default)]
    pub votes: u32,
}

/// A poll as persisted and as served by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    /// Voting window in seconds.
    pub timer: u32,
    pub teacher_username: String,
    /// Participant -> chosen option text.
    pub votes: BTreeMap<String, String>,
    pub total_votes: u32,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Poll {
    /// Current counts per option text. Options sharing a text are summed.
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::new();
        for option in &self.options {
            *tally.entry(option.text.clone()).or_insert(0) += option.votes;
        }
        tally
    }

    /// `total_votes == sum(option.votes) == votes.len()`
    pub fn is_consistent(&self) -> bool {
        let option_sum: u64 = self.options.iter().map(|o| u64::from(o.votes)).sum();
        option_sum == u64::from(self.total_votes) && self.votes.len() == self.total_votes as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub username: String,
    pub polls_created: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll() -> Poll {
        let now = Utc::now();
        Poll {
            id: PollId::new(),
            question: "2+2=?".into(),
            options: vec![
                PollOption { text: "4".into(), correct: true, votes: 1 },
                PollOption { text: "5".into(), correct: false, votes: 0 },
            ],
            timer: 30,
            teacher_username: "teacher_1".into(),
            votes: BTreeMap::from([("alice".to_string(), "4".to_string())]),
            total_votes: 1,
            status: PollStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_poll_json_shape() {
        let poll = sample_poll();
        let value = serde_json::to_value(&poll).unwrap();
        assert_eq!(value["_id"], poll.id.to_string());
        assert_eq!(value["teacherUsername"], "teacher_1");
        assert_eq!(value["totalVotes"], 1);
        assert_eq!(value["status"], "active");
        assert_eq!(value["votes"]["alice"], "4");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_tally_and_consistency() {
        let mut poll = sample_poll();
        assert!(poll.is_consistent());
        assert_eq!(poll.tally(), Tally::from([("4".into(), 1), ("5".into(), 0)]));

        poll.total_votes = 2;
        assert!(!poll.is_consistent());
    }

    #[test]
    fn test_tally_sums_duplicate_texts() {
        let mut poll = sample_poll();
        poll.options.push(PollOption { text: "4".into(), correct: false, votes: 2 });
        assert_eq!(poll.tally()["4"], 3);
    }

    #[test]
    fn test_poll_id_parse() {
        let id = PollId::new();
        assert_eq!(id.to_string().parse::<PollId>().unwrap(), id);
        assert!("not-a-uuid".parse::<PollId>().is_err());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("completed".parse::<PollStatus>().unwrap(), PollStatus::Completed);
        assert_eq!(PollStatus::Active.as_str(), "active");
        assert!("paused".parse::<PollStatus>().is_err());
    }
}
