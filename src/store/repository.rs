//! Pool store repository.
//!
//! Uniqueness of `public_id` is enforced by the database, not by in-process
//! locking: two workers racing on the same key resolve as one insert and one
//! `DuplicatePublicId`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::crypto::SealedSecret;
use crate::matcher::{Pattern, PatternType};

use super::db::Database;
use super::models::{EntryStatus, InsertOutcome, NewPoolEntry, PoolEntry, StatusCounts};
use super::StoreError;

/// Abstraction over pool persistence, shared by every search worker.
pub trait PoolStore: Send + Sync {
    /// Number of `ready` entries in the buffer for `pattern`.
    ///
    /// A buffer is keyed by the pattern text, its match type and its case
    /// sensitivity, so a prefix `AB` key never counts toward suffix `AB`.
    fn count_ready(&self, pattern: &Pattern) -> Result<usize, StoreError>;

    /// Atomically insert an entry unless its public id already exists.
    fn try_insert(&self, entry: &NewPoolEntry) -> Result<InsertOutcome, StoreError>;

    /// Entry counts by status in the buffer for `pattern`.
    fn status_counts(&self, pattern: &Pattern) -> Result<StatusCounts, StoreError>;

    /// Look up a single entry by its public id.
    fn find_by_public_id(&self, public_id: &str) -> Result<Option<PoolEntry>, StoreError>;
}

const ENTRY_COLUMNS: &str = "id, public_id, sealed_secret, pattern, match_type, case_sensitive,
     status, reserved_until, created_at, used_at";

/// SQLite-backed pool store.
pub struct SqlitePoolStore {
    db: Mutex<Database>,
}

impl SqlitePoolStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run a closure against the raw connection (tests only).
    #[cfg(test)]
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> T) -> T {
        let db = self.db.lock().unwrap();
        f(db.conn())
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<PoolEntry> {
        let id_str: String = row.get(0)?;
        let sealed: Vec<u8> = row.get(2)?;
        let match_type_str: String = row.get(4)?;
        let status_str: String = row.get(6)?;
        let reserved_until: Option<String> = row.get(7)?;
        let created_at: String = row.get(8)?;
        let used_at: Option<String> = row.get(9)?;

        let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;
        let sealed_secret = SealedSecret::from_bytes(sealed).map_err(|e| conversion_error(2, e))?;
        let match_type = match_type_str
            .parse::<PatternType>()
            .map_err(|e| conversion_error(4, StoreError::Corrupt(e)))?;
        let status = status_str
            .parse::<EntryStatus>()
            .map_err(|e| conversion_error(6, StoreError::Corrupt(e)))?;

        Ok(PoolEntry {
            id,
            public_id: row.get(1)?,
            sealed_secret,
            pattern: row.get(3)?,
            match_type,
            case_sensitive: row.get(5)?,
            status,
            reserved_until: reserved_until
                .as_deref()
                .map(|s| parse_timestamp(7, s))
                .transpose()?,
            created_at: parse_timestamp(8, &created_at)?,
            used_at: used_at.as_deref().map(|s| parse_timestamp(9, s)).transpose()?,
        })
    }
}

impl PoolStore for SqlitePoolStore {
    fn count_ready(&self, pattern: &Pattern) -> Result<usize, StoreError> {
        let db = self.lock()?;
        let count: i64 = db.conn().query_row(
            "SELECT count(*) FROM vanity_keypairs
             WHERE pattern = ?1 AND match_type = ?2 AND case_sensitive = ?3
               AND status = 'ready'",
            params![
                pattern.pattern(),
                pattern.pattern_type().as_str(),
                pattern.case_sensitive()
            ],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn try_insert(&self, entry: &NewPoolEntry) -> Result<InsertOutcome, StoreError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let db = self.lock()?;
        let inserted = db.conn().execute(
            "INSERT INTO vanity_keypairs
                (id, public_id, sealed_secret, pattern, match_type, case_sensitive,
                 status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(public_id) DO NOTHING",
            params![
                id.to_string(),
                entry.public_id,
                entry.sealed_secret.as_bytes(),
                entry.pattern,
                entry.match_type.as_str(),
                entry.case_sensitive,
                EntryStatus::Ready.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            tracing::debug!(public_id = %entry.public_id, "Public id already pooled");
            return Ok(InsertOutcome::DuplicatePublicId);
        }

        Ok(InsertOutcome::Inserted(PoolEntry {
            id,
            public_id: entry.public_id.clone(),
            sealed_secret: entry.sealed_secret.clone(),
            pattern: entry.pattern.clone(),
            match_type: entry.match_type,
            case_sensitive: entry.case_sensitive,
            status: EntryStatus::Ready,
            reserved_until: None,
            created_at,
            used_at: None,
        }))
    }

    fn status_counts(&self, pattern: &Pattern) -> Result<StatusCounts, StoreError> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare(
            "SELECT status, count(*) FROM vanity_keypairs
             WHERE pattern = ?1 AND match_type = ?2 AND case_sensitive = ?3
             GROUP BY status",
        )?;
        let rows = stmt.query_map(
            params![
                pattern.pattern(),
                pattern.pattern_type().as_str(),
                pattern.case_sensitive()
            ],
            |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as usize))
            },
        )?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            match status.parse::<EntryStatus>().map_err(StoreError::Corrupt)? {
                EntryStatus::Ready => counts.ready = count,
                EntryStatus::Reserved => counts.reserved = count,
                EntryStatus::Used => counts.used = count,
            }
        }
        Ok(counts)
    }

    fn find_by_public_id(&self, public_id: &str) -> Result<Option<PoolEntry>, StoreError> {
        let db = self.lock()?;
        let entry = db
            .conn()
            .query_row(
                &format!("SELECT {} FROM vanity_keypairs WHERE public_id = ?1", ENTRY_COLUMNS),
                params![public_id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}
