//! CRUD operations for [`Teacher`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use pollroom_shared::Teacher;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::polls::{format_ts, parse_ts};

impl Database {
    /// Return the teacher named `username`, creating the record first if it
    /// does not exist yet.
    pub fn ensure_teacher(&self, username: &str, now: DateTime<Utc>) -> Result<Teacher> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO teachers (username, polls_created, created_at, updated_at)
             VALUES (?1, 0, ?2, ?2)",
            params![username, format_ts(&now)],
        )?;

        if inserted > 0 {
            tracing::debug!(teacher = %username, "created teacher record");
        }

        self.get_teacher(username)
    }

    pub fn get_teacher(&self, username: &str) -> Result<Teacher> {
        self.conn()
            .query_row(
                "SELECT username, polls_created, created_at, updated_at
                 FROM teachers WHERE username = ?1",
                params![username],
                |row| {
                    let created: String = row.get(2)?;
                    let updated: String = row.get(3)?;
                    Ok(Teacher {
                        username: row.get(0)?,
                        polls_created: row.get(1)?,
                        created_at: parse_ts(2, &created)?,
                        updated_at: parse_ts(3, &updated)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}
