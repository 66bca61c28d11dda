//! Top-level error types.
//!
//! Aggregates the crypto, store and configuration errors into the taxonomy
//! the replenishment controller logs and acts on.

use crate::config::ConfigError;
use crate::crypto::SealError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A sealed secret failed tag verification.
    #[error("Authentication failed: sealed secret was tampered with or the key is wrong")]
    Authentication,

    /// A sealed secret is too short to hold its nonce and tag.
    #[error("Malformed sealed secret: {len} bytes, expected at least {min}")]
    Format { len: usize, min: usize },

    /// Persistence failed. Retried on the next controller cycle.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Search threads could not be started.
    #[error("Failed to spawn search threads: {0}")]
    Worker(#[from] std::io::Error),
}

impl From<SealError> for PoolError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::Configuration(msg) => PoolError::Configuration(msg),
            SealError::Authentication => PoolError::Authentication,
            SealError::Format { len, min } => PoolError::Format { len, min },
        }
    }
}

impl From<ConfigError> for PoolError {
    fn from(err: ConfigError) -> Self {
        PoolError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
