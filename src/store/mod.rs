//! Durable pool storage.
//!
//! Sealed entries live in a SQLite table keyed by public id. The uniqueness
//! constraint on `public_id` is the only coordination between workers.

mod db;
mod error;
mod models;
mod repository;

pub use db::Database;
pub use error::StoreError;
pub use models::{EntryStatus, InsertOutcome, NewPoolEntry, PoolEntry, StatusCounts};
pub use repository::{PoolStore, SqlitePoolStore};
