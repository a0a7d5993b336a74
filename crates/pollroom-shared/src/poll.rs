//! Poll creation input and its validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{MAX_OPTIONS, MAX_QUESTION_LEN, MAX_TIMER_SECS, MIN_OPTIONS, MIN_TIMER_SECS};
use crate::error::PollError;
use crate::types::{Poll, PollId, PollOption, PollStatus};

/// An answer choice as submitted by the teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// Payload of the `createPoll` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<OptionDraft>,
    /// Seconds. Clients send either a number or a numeric string.
    #[serde(deserialize_with = "lenient_seconds")]
    pub timer: i64,
    pub teacher_username: String,
}

impl CreatePoll {
    pub fn validate(&self) -> Result<(), PollError> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(PollError::validation("question must not be empty"));
        }
        if question.chars().count() > MAX_QUESTION_LEN {
            return Err(PollError::validation(format!(
                "question must be at most {MAX_QUESTION_LEN} characters"
            )));
        }

        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(PollError::validation(format!(
                "a poll needs between {MIN_OPTIONS} and {MAX_OPTIONS} options, got {}",
                self.options.len()
            )));
        }
        if let Some(pos) = self.options.iter().position(|o| o.text.trim().is_empty()) {
            return Err(PollError::validation(format!("option {} has no text", pos + 1)));
        }

        if !(i64::from(MIN_TIMER_SECS)..=i64::from(MAX_TIMER_SECS)).contains(&self.timer) {
            return Err(PollError::validation(format!(
                "timer must be between {MIN_TIMER_SECS} and {MAX_TIMER_SECS} seconds, got {}",
                self.timer
            )));
        }

        if self.teacher_username.trim().is_empty() {
            return Err(PollError::validation("teacherUsername is required"));
        }

        Ok(())
    }

    /// Validate and build a fresh active poll with zero tallies.
    pub fn into_poll(self, id: PollId, now: DateTime<Utc>) -> Result<Poll, PollError> {
        self.validate()?;

        // validate() bounds the timer to [30, 90]
        let timer = u32::try_from(self.timer).map_err(|_| PollError::validation("timer out of range"))?;

        Ok(Poll {
            id,
            question: self.question.trim().to_string(),
            options: self
                .options
                .into_iter()
                .map(|o| PollOption {
                    text: o.text,
                    correct: o.correct,
                    votes: 0,
                })
                .collect(),
            timer,
            teacher_username: self.teacher_username,
            votes: BTreeMap::new(),
            total_votes: 0,
            status: PollStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Int(n) => Ok(n),
        Seconds::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Seconds::Float(f) => Err(serde::de::Error::custom(format!("invalid timer: {f}"))),
        Seconds::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid timer: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> CreatePoll {
        CreatePoll {
            question: "2+2=?".into(),
            options: vec![
                OptionDraft { text: "4".into(), correct: true },
                OptionDraft { text: "5".into(), correct: false },
            ],
            timer: 30,
            teacher_username: "teacher_1".into(),
        }
    }

    #[test]
    fn test_valid_draft_builds_empty_poll() {
        let id = PollId::new();
        let poll = draft().into_poll(id, Utc::now()).unwrap();
        assert_eq!(poll.id, id);
        assert_eq!(poll.status, PollStatus::Active);
        assert_eq!(poll.total_votes, 0);
        assert!(poll.votes.is_empty());
        assert!(poll.options.iter().all(|o| o.votes == 0));
        assert!(poll.is_consistent());
    }

    #[test]
    fn test_question_length_limit() {
        let mut d = draft();
        d.question = "x".repeat(MAX_QUESTION_LEN);
        assert!(d.validate().is_ok());

        d.question = "x".repeat(MAX_QUESTION_LEN + 1);
        assert!(matches!(d.validate(), Err(PollError::Validation(_))));

        d.question = "   ".into();
        assert!(matches!(d.validate(), Err(PollError::Validation(_))));
    }

    #[test]
    fn test_timer_bounds() {
        for (timer, ok) in [(29, false), (30, true), (90, true), (91, false), (-5, false)] {
            let mut d = draft();
            d.timer = timer;
            assert_eq!(d.validate().is_ok(), ok, "timer {timer}");
        }
    }

    #[test]
    fn test_option_shape() {
        let mut d = draft();
        d.options.truncate(1);
        assert!(d.validate().is_err());

        let mut d = draft();
        d.options[1].text = " ".into();
        assert!(d.validate().is_err());

        let mut d = draft();
        d.options = (0..=MAX_OPTIONS)
            .map(|i| OptionDraft { text: i.to_string(), correct: false })
            .collect();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_timer_accepts_numeric_string() {
        let json = r#"{"question":"q","options":[{"text":"a","correct":true},{"text":"b"}],"timer":"45","teacherUsername":"teacher_1"}"#;
        let parsed: CreatePoll = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.timer, 45);
        assert!(!parsed.options[1].correct);

        let bad = json.replace("\"45\"", "\"soon\"");
        assert!(serde_json::from_str::<CreatePoll>(&bad).is_err());
    }
}
