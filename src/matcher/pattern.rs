//! Pattern matching implementation.

use std::str::FromStr;

use crate::crypto::{is_base58, MAX_ADDRESS_LEN};

/// The type of pattern matching to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternType {
    /// Match at the beginning of the address
    Prefix,
    /// Match at the end of the address
    #[default]
    Suffix,
    /// Match anywhere in the address
    Contains,
}

impl PatternType {
    /// Stable name, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Prefix => "prefix",
            PatternType::Suffix => "suffix",
            PatternType::Contains => "contains",
        }
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prefix" | "start" | "begin" => Ok(PatternType::Prefix),
            "suffix" | "end" => Ok(PatternType::Suffix),
            "contains" | "anywhere" | "any" => Ok(PatternType::Contains),
            _ => Err(format!("Unknown pattern type: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a pattern match operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Full match found
    Match,
    /// No match
    NoMatch,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

impl From<bool> for MatchResult {
    #[inline]
    fn from(matched: bool) -> Self {
        if matched {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

/// Errors from pattern validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Pattern cannot be empty")]
    Empty,

    #[error("Pattern '{0}' contains characters outside the base-58 alphabet (0, O, I and l never appear)")]
    NotBase58(String),

    #[error("Pattern '{0}' is longer than an address (44 characters)")]
    TooLong(String),
}

/// A validated pattern for efficient matching against base-58 addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The pattern text as configured, ASCII-lowercased when case-insensitive
    pattern: String,
    /// The pattern type
    pattern_type: PatternType,
    /// Whether matching is case sensitive
    case_sensitive: bool,
}

impl Pattern {
    /// Creates a new pattern without validating it.
    ///
    /// Case-insensitive text is folded to lowercase so `SB` and `sb` name the
    /// same buffer.
    pub fn new(pattern: impl Into<String>, pattern_type: PatternType, case_sensitive: bool) -> Self {
        let mut pattern = pattern.into();
        if !case_sensitive {
            pattern.make_ascii_lowercase();
        }
        Self {
            pattern,
            pattern_type,
            case_sensitive,
        }
    }

    /// Creates a pattern, rejecting text that can never appear in an address.
    ///
    /// Case-insensitive patterns only need some casing of each character to be
    /// valid base-58, since `l` can still match an `L` in the address.
    pub fn parse(
        pattern: impl Into<String>,
        pattern_type: PatternType,
        case_sensitive: bool,
    ) -> Result<Self, PatternError> {
        let pattern = pattern.into();

        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.len() > MAX_ADDRESS_LEN {
            return Err(PatternError::TooLong(pattern));
        }

        let valid = if case_sensitive {
            is_base58(&pattern)
        } else {
            pattern.chars().all(|c| {
                is_base58(c.to_ascii_lowercase().encode_utf8(&mut [0; 4]))
                    || is_base58(c.to_ascii_uppercase().encode_utf8(&mut [0; 4]))
            })
        };
        if !valid {
            return Err(PatternError::NotBase58(pattern));
        }

        Ok(Self::new(pattern, pattern_type, case_sensitive))
    }

    /// Returns the pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the pattern type.
    pub fn pattern_type(&self) -> PatternType {
        self.pattern_type
    }

    /// Returns whether matching is case sensitive.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Matches an address against this pattern.
    ///
    /// Runs once per generated keypair, so it compares byte slices in place.
    #[inline]
    pub fn matches(&self, address: &str) -> MatchResult {
        let addr = address.as_bytes();
        let pat = self.pattern.as_bytes();

        if pat.is_empty() {
            return MatchResult::Match;
        }
        if pat.len() > addr.len() {
            return MatchResult::NoMatch;
        }

        let eq = |a: &[u8]| {
            if self.case_sensitive {
                a == pat
            } else {
                a.eq_ignore_ascii_case(pat)
            }
        };

        let matched = match self.pattern_type {
            PatternType::Prefix => eq(&addr[..pat.len()]),
            PatternType::Suffix => eq(&addr[addr.len() - pat.len()..]),
            PatternType::Contains => addr.windows(pat.len()).any(eq),
        };

        matched.into()
    }

    /// Returns the estimated number of attempts to find one match.
    ///
    /// Each base-58 position has 58 possible values; a case-insensitive
    /// letter with two valid casings halves that.
    pub fn estimated_difficulty(&self) -> u64 {
        self.pattern.chars().fold(1u64, |acc, c| {
            let choices = if self.case_sensitive {
                58
            } else {
                let lower = c.to_ascii_lowercase();
                let upper = c.to_ascii_uppercase();
                let both = lower != upper
                    && is_base58(lower.encode_utf8(&mut [0; 4]))
                    && is_base58(upper.encode_utf8(&mut [0; 4]));
                if both {
                    29
                } else {
                    58
                }
            };
            acc.saturating_mul(choices)
        })
    }

    /// Returns a human-readable difficulty estimate.
    pub fn difficulty_description(&self) -> String {
        let diff = self.estimated_difficulty();
        match diff {
            0..=1_000 => "Very Easy (< 1 second)".into(),
            1_001..=1_000_000 => "Easy (seconds)".into(),
            1_000_001..=100_000_000 => "Medium (minutes)".into(),
            100_000_001..=10_000_000_000 => "Hard (hours)".into(),
            _ => "Very Hard (days or more)".into(),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}", self.pattern, self.pattern_type)?;
        if !self.case_sensitive {
            f.write_str(", case-insensitive")?;
        }
        f.write_str(")")
    }
}

/// Default matching policy: does `public_id` end with `pattern`?
#[inline]
pub fn matches(public_id: &str, pattern: &str, case_sensitive: bool) -> bool {
    let addr = public_id.as_bytes();
    let pat = pattern.as_bytes();
    if pat.len() > addr.len() {
        return false;
    }
    let tail = &addr[addr.len() - pat.len()..];
    if case_sensitive {
        tail == pat
    } else {
        tail.eq_ignore_ascii_case(pat)
    }
}
