//! # pollroom-store
//!
//! Durable storage for Pollroom, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle with typed CRUD
//! helpers for polls and teachers, and the [`PollStore`] trait through which
//! the server reaches persistence.

pub mod database;
pub mod migrations;
pub mod polls;
pub mod store;
pub mod teachers;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use store::{PollStore, SqliteStore};
