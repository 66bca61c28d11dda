//! Pattern matching for base-58 addresses.
//!
//! Supports multiple matching strategies:
//! - Suffix: Match at the end of the address (default; wallets show the tail)
//! - Prefix: Match at the start of the address
//! - Contains: Match anywhere in the address

mod pattern;

pub use pattern::{matches, MatchResult, Pattern, PatternError, PatternType};
