//! Pool entry data models.
//!
//! Secret keys only ever appear here in sealed form.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto::SealedSecret;
use crate::matcher::PatternType;

/// Lifecycle state of a pool entry.
///
/// Transitions are `ready → reserved → used`, or `reserved → ready` when a
/// reservation expires. Only `ready` entries count toward a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStatus {
    #[default]
    Ready,
    Reserved,
    Used,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Ready => "ready",
            EntryStatus::Reserved => "reserved",
            EntryStatus::Used => "used",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(EntryStatus::Ready),
            "reserved" => Ok(EntryStatus::Reserved),
            "used" => Ok(EntryStatus::Used),
            _ => Err(format!("Unknown entry status: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A matched keypair ready to be persisted.
///
/// `(pattern, match_type, case_sensitive)` identifies the buffer the entry
/// counts toward.
#[derive(Debug, Clone)]
pub struct NewPoolEntry {
    pub public_id: String,
    pub sealed_secret: SealedSecret,
    pub pattern: String,
    pub match_type: PatternType,
    pub case_sensitive: bool,
}

/// A stored pool entry.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub id: Uuid,
    pub public_id: String,
    pub sealed_secret: SealedSecret,
    pub pattern: String,
    pub match_type: PatternType,
    pub case_sensitive: bool,
    pub status: EntryStatus,
    pub reserved_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Outcome of an insert attempt.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(PoolEntry),
    /// Another entry already holds this public id. Expected, not an error.
    DuplicatePublicId,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Entry counts per status for one pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ready: usize,
    pub reserved: usize,
    pub used: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.ready + self.reserved + self.used
    }
}
