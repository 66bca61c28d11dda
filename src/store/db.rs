//! SQLite database management.
//!
//! Opens the pool database and creates the schema if it is absent. Schema
//! creation is idempotent and safe to race against other processes.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around the pool's SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// `busy_timeout` bounds how long any statement waits on a lock held by
    /// another connection before failing with [`StoreError::Timeout`].
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // WAL lets readers proceed while another process is inserting.
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "Opened pool database");

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create tables and indexes if they do not exist.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vanity_keypairs (
                id              TEXT PRIMARY KEY,
                public_id       TEXT NOT NULL UNIQUE,
                sealed_secret   BLOB NOT NULL,
                pattern         TEXT NOT NULL,
                match_type      TEXT NOT NULL DEFAULT 'suffix'
                                CHECK (match_type IN ('prefix', 'suffix', 'contains')),
                case_sensitive  INTEGER NOT NULL DEFAULT 1,
                status          TEXT NOT NULL DEFAULT 'ready'
                                CHECK (status IN ('ready', 'reserved', 'used')),
                reserved_until  TEXT,
                created_at      TEXT NOT NULL,
                used_at         TEXT
            );
            ",
        )?;

        // Databases created before match types were tracked only held suffix keys.
        if !self.has_column("vanity_keypairs", "match_type")? {
            self.conn.execute_batch(
                "ALTER TABLE vanity_keypairs
                    ADD COLUMN match_type TEXT NOT NULL DEFAULT 'suffix';
                 DROP INDEX IF EXISTS idx_vanity_keypairs_pattern;",
            )?;
            tracing::info!("Added match_type column to pool schema");
        }

        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_vanity_keypairs_buffer
                ON vanity_keypairs(pattern, match_type, case_sensitive, status);",
        )?;

        tracing::debug!("Pool schema ready");
        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
