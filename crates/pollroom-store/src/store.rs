//! The durable store as seen by the server.
//!
//! [`PollStore`] is the seam between the live session coordinator and
//! persistence. [`SqliteStore`] is the production implementation; it
//! serializes access to a single [`Database`] connection.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;

use pollroom_shared::{Poll, PollId, Teacher};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Durable persistence for polls and teachers.
///
/// Create is append-only; later writes replace the mutable part of the
/// poll document wholesale.
pub trait PollStore: Send + Sync {
    fn create_poll(&self, poll: &Poll) -> Result<()>;

    fn update_poll(&self, poll: &Poll) -> Result<()>;

    fn get_poll(&self, id: PollId) -> Result<Poll>;

    /// Newest first.
    fn polls_for_teacher(&self, username: &str) -> Result<Vec<Poll>>;

    fn ensure_teacher(&self, username: &str) -> Result<Teacher>;

    fn count_active_polls(&self) -> Result<usize>;
}

pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Database::open_at(path).map(Self::new)
    }

    pub fn open_default() -> Result<Self> {
        Database::new().map(Self::new)
    }

    pub fn in_memory() -> Result<Self> {
        Database::open_in_memory().map(Self::new)
    }

    fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut db)
    }
}

impl PollStore for SqliteStore {
    fn create_poll(&self, poll: &Poll) -> Result<()> {
        self.with_db(|db| db.insert_poll(poll))
    }

    fn update_poll(&self, poll: &Poll) -> Result<()> {
        self.with_db(|db| db.update_poll(poll))
    }

    fn get_poll(&self, id: PollId) -> Result<Poll> {
        self.with_db(|db| db.get_poll(id))
    }

    fn polls_for_teacher(&self, username: &str) -> Result<Vec<Poll>> {
        self.with_db(|db| db.list_polls_for_teacher(username))
    }

    fn ensure_teacher(&self, username: &str) -> Result<Teacher> {
        self.with_db(|db| db.ensure_teacher(username, Utc::now()))
    }

    fn count_active_polls(&self) -> Result<usize> {
        self.with_db(|db| db.count_active_polls())
    }
}
