//! CRUD operations for [`Poll`] records.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use pollroom_shared::{Poll, PollId, PollOption, PollStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};

const POLL_COLUMNS: &str = "id, question, options, timer, teacher_username, votes, total_votes, status, created_at, updated_at";

/// Fixed-width UTC timestamps so `ORDER BY created_at` sorts chronologically.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new poll and bump the owning teacher's `polls_created`
    /// counter, atomically. Owners without a teacher record are accepted.
    pub fn insert_poll(&mut self, poll: &Poll) -> Result<()> {
        let options = serde_json::to_string(&poll.options)?;
        let votes = serde_json::to_string(&poll.votes)?;

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO polls (id, question, options, timer, teacher_username, votes, total_votes, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                poll.id.to_string(),
                poll.question,
                options,
                poll.timer,
                poll.teacher_username,
                votes,
                poll.total_votes,
                poll.status.as_str(),
                format_ts(&poll.created_at),
                format_ts(&poll.updated_at),
            ],
        )?;
        tx.execute(
            "UPDATE teachers SET polls_created = polls_created + 1, updated_at = ?1
             WHERE username = ?2",
            params![format_ts(&poll.created_at), poll.teacher_username],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_poll(&self, id: PollId) -> Result<Poll> {
        self.conn()
            .query_row(
                &format!("SELECT {POLL_COLUMNS} FROM polls WHERE id = ?1"),
                params![id.to_string()],
                row_to_poll,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All polls owned by `username`, newest first.
    pub fn list_polls_for_teacher(&self, username: &str) -> Result<Vec<Poll>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POLL_COLUMNS}
             FROM polls
             WHERE teacher_username = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![username], row_to_poll)?;

        let mut polls = Vec::new();
        for row in rows {
            polls.push(row?);
        }
        Ok(polls)
    }

    /// Number of polls still marked active.
    pub fn count_active_polls(&self) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM polls WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the mutable part of a poll document: options with their
    /// counters, the vote map, the total and the status.
    pub fn update_poll(&self, poll: &Poll) -> Result<()> {
        let options = serde_json::to_string(&poll.options)?;
        let votes = serde_json::to_string(&poll.votes)?;

        let affected = self.conn().execute(
            "UPDATE polls
             SET options = ?1, votes = ?2, total_votes = ?3, status = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                options,
                votes,
                poll.total_votes,
                poll.status.as_str(),
                format_ts(&poll.updated_at),
                poll.id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Map a `rusqlite::Row` to a [`Poll`].
fn row_to_poll(row: &rusqlite::Row<'_>) -> rusqlite::Result<Poll> {
    let id_str: String = row.get(0)?;
    let question: String = row.get(1)?;
    let options_json: String = row.get(2)?;
    let timer: u32 = row.get(3)?;
    let teacher_username: String = row.get(4)?;
    let votes_json: String = row.get(5)?;
    let total_votes: u32 = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    let id = id_str.parse::<PollId>().map_err(|e| conversion_error(0, e))?;
    let options: Vec<PollOption> =
        serde_json::from_str(&options_json).map_err(|e| conversion_error(2, e))?;
    let votes: BTreeMap<String, String> =
        serde_json::from_str(&votes_json).map_err(|e| conversion_error(5, e))?;
    let status = status_str
        .parse::<PollStatus>()
        .map_err(|e| conversion_error(7, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    Ok(Poll {
        id,
        question,
        options,
        timer,
        teacher_username,
        votes,
        total_votes,
        status,
        created_at: parse_ts(8, &created_str)?,
        updated_at: parse_ts(9, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_poll(teacher: &str, created_at: DateTime<Utc>) -> Poll {
        Poll {
            id: PollId::new(),
            question: "2+2=?".into(),
            options: vec![
                PollOption { text: "4".into(), correct: true, votes: 0 },
                PollOption { text: "5".into(), correct: false, votes: 0 },
            ],
            timer: 30,
            teacher_username: teacher.into(),
            votes: BTreeMap::new(),
            total_votes: 0,
            status: PollStatus::Active,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn insert_and_get_poll() {
        let mut db = Database::open_in_memory().unwrap();
        let poll = sample_poll("teacher_1", Utc::now());
        db.insert_poll(&poll).unwrap();

        let loaded = db.get_poll(poll.id).unwrap();
        assert_eq!(loaded.id, poll.id);
        assert_eq!(loaded.options, poll.options);
        assert_eq!(loaded.status, PollStatus::Active);
        assert_eq!(loaded.created_at.timestamp_micros(), poll.created_at.timestamp_micros());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let poll = sample_poll("teacher_1", Utc::now());
        db.insert_poll(&poll).unwrap();
        assert!(db.insert_poll(&poll).is_err());
    }

    #[test]
    fn get_missing_poll() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_poll(PollId::new()), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_overwrites_results() {
        let mut db = Database::open_in_memory().unwrap();
        let mut poll = sample_poll("teacher_1", Utc::now());
        db.insert_poll(&poll).unwrap();

        poll.votes.insert("alice".into(), "4".into());
        poll.options[0].votes = 1;
        poll.total_votes = 1;
        poll.status = PollStatus::Completed;
        db.update_poll(&poll).unwrap();

        let loaded = db.get_poll(poll.id).unwrap();
        assert_eq!(loaded.total_votes, 1);
        assert_eq!(loaded.votes.get("alice").map(String::as_str), Some("4"));
        assert_eq!(loaded.options[0].votes, 1);
        assert_eq!(loaded.status, PollStatus::Completed);
        assert!(loaded.is_consistent());
        assert_eq!(db.count_active_polls().unwrap(), 0);
    }

    #[test]
    fn update_missing_poll_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let poll = sample_poll("teacher_1", Utc::now());
        assert!(matches!(db.update_poll(&poll), Err(StoreError::NotFound)));
    }

    #[test]
    fn list_is_newest_first_and_scoped() {
        let mut db = Database::open_in_memory().unwrap();
        let t0 = Utc::now();
        let older = sample_poll("teacher_1", t0 - Duration::seconds(60));
        let newer = sample_poll("teacher_1", t0);
        let other = sample_poll("teacher_2", t0);
        db.insert_poll(&older).unwrap();
        db.insert_poll(&newer).unwrap();
        db.insert_poll(&other).unwrap();

        let listed = db.list_polls_for_teacher("teacher_1").unwrap();
        let ids: Vec<PollId> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert!(db.list_polls_for_teacher("nobody").unwrap().is_empty());
        assert_eq!(db.count_active_polls().unwrap(), 3);
    }
}
