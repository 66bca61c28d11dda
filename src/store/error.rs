//! Store error types.

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// The database stayed busy or locked past the configured busy timeout.
    #[error("Database timed out waiting for a lock: {0}")]
    Timeout(rusqlite::Error),

    #[error("Corrupt pool entry: {0}")]
    Corrupt(String),

    #[error("Database connection lock poisoned by a panicked worker")]
    Poisoned,
}

impl StoreError {
    /// Whether retrying on the next replenishment cycle is likely to help.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Timeout(err)
            }
            _ => StoreError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_is_timeout() {
        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_other_failures_are_database_errors() {
        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_CORRUPT));
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_transient());

        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
