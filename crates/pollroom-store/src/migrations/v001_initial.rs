//! v001 -- Initial schema creation.
//!
//! Creates the `teachers` and `polls` tables. Options and the vote map are
//! stored as JSON documents and rewritten whole on every update.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Teachers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS teachers (
    username      TEXT PRIMARY KEY NOT NULL,
    polls_created INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,              -- RFC-3339, UTC
    updated_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Polls
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS polls (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    question         TEXT NOT NULL,
    options          TEXT NOT NULL,               -- JSON array of {text, correct, votes}
    timer            INTEGER NOT NULL CHECK (timer BETWEEN 30 AND 90),
    teacher_username TEXT NOT NULL,               -- no FK: owners may be unknown
    votes            TEXT NOT NULL DEFAULT '{}',  -- JSON object participant -> option text
    total_votes      INTEGER NOT NULL DEFAULT 0,
    status           TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'completed')),
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_polls_teacher_created
    ON polls(teacher_username, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_polls_status ON polls(status);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
