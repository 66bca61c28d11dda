//! Runtime configuration for the vanity pool service.
//!
//! Every flag can also be supplied through its `VANITY_*` environment
//! variable. The parsed [`Config`] is turned into an immutable
//! [`PoolConfig`] once at startup and shared from there.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::matcher::{Pattern, PatternError, PatternType};

/// Solana vanity keypair pool
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Comma-separated patterns to keep buffered
    #[arg(
        short,
        long,
        env = "VANITY_PATTERNS",
        value_delimiter = ',',
        default_values = ["SNOW", "SB"]
    )]
    pub patterns: Vec<String>,

    /// Minimum number of ready keypairs to keep per pattern
    #[arg(short = 'm', long, env = "VANITY_MIN_BUFFER", default_value = "5")]
    pub min_buffer: usize,

    /// Master key material used to seal secrets (hex, base64, 32 raw bytes or a passphrase)
    #[arg(long, env = "VANITY_MASTER_KEY", hide_env_values = true)]
    pub master_key: Option<String>,

    /// Path of the SQLite pool database
    #[arg(long, env = "VANITY_DB_PATH", default_value = "vanity_pool.db")]
    pub db_path: PathBuf,

    /// Seconds to wait between buffer checks
    #[arg(short = 'i', long, env = "VANITY_CHECK_INTERVAL", default_value = "60")]
    pub check_interval: u64,

    /// Number of search threads per pattern (default: CPU cores, split across patterns in parallel mode)
    #[arg(short = 'w', long, env = "VANITY_WORKERS")]
    pub workers: Option<usize>,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, env = "VANITY_REPORT_INTERVAL", default_value = "10")]
    pub report_interval: u64,

    /// Pattern type: suffix, prefix, or contains
    #[arg(short = 't', long, env = "VANITY_MATCH_TYPE", default_value = "suffix")]
    pub pattern_type: PatternType,

    /// Match patterns without regard to ASCII case
    #[arg(long, env = "VANITY_CASE_INSENSITIVE")]
    pub case_insensitive: bool,

    /// Replenish every pattern on its own thread instead of one after another
    #[arg(long, env = "VANITY_PARALLEL")]
    pub parallel: bool,

    /// Milliseconds a store operation may wait on a database lock
    #[arg(long, env = "VANITY_STORE_TIMEOUT_MS", default_value = "5000")]
    pub store_timeout_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "VANITY_LOG_JSON")]
    pub log_json: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("patterns", &self.patterns)
            .field("min_buffer", &self.min_buffer)
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field("db_path", &self.db_path)
            .field("check_interval", &self.check_interval)
            .field("workers", &self.workers)
            .field("report_interval", &self.report_interval)
            .field("pattern_type", &self.pattern_type)
            .field("case_insensitive", &self.case_insensitive)
            .field("parallel", &self.parallel)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Config {
    /// Returns the number of search threads each fill uses.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let cpus = num_cpus::get();
            if self.parallel {
                (cpus / self.patterns.len().max(1)).max(1)
            } else {
                cpus
            }
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.master_key.as_deref() {
            None | Some("") => return Err(ConfigError::MissingMasterKey),
            Some(_) => {}
        }

        let patterns = self.build_patterns()?;
        if patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }

        // Case-insensitive text is already folded, so `sb` and `SB` collide here.
        let mut seen = std::collections::HashSet::new();
        for pattern in patterns {
            if !seen.insert(pattern.pattern().to_string()) {
                return Err(ConfigError::DuplicatePattern(pattern.pattern().to_string()));
            }
        }

        if self.check_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "check interval must be at least one second".into(),
            ));
        }
        if self.report_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "report interval must be at least one second".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidValue(
                "worker count must be at least one".into(),
            ));
        }

        Ok(())
    }

    /// Builds the immutable runtime configuration.
    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        self.validate()?;

        let targets = self
            .build_patterns()?
            .into_iter()
            .map(|pattern| BufferTarget {
                pattern,
                min_ready: self.min_buffer,
            })
            .collect();

        Ok(PoolConfig {
            targets,
            workers: self.worker_count(),
            check_interval: Duration::from_secs(self.check_interval),
            report_interval: Duration::from_secs(self.report_interval),
            parallel: self.parallel,
        })
    }

    /// Returns the store busy timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    fn build_patterns(&self) -> Result<Vec<Pattern>, ConfigError> {
        self.patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                Pattern::parse(p, self.pattern_type, !self.case_insensitive)
                    .map_err(ConfigError::InvalidPattern)
            })
            .collect()
    }
}

/// One pattern's buffer requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferTarget {
    pub pattern: Pattern,
    pub min_ready: usize,
}

/// Immutable runtime configuration, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Buffer targets, processed in this order
    pub targets: Vec<BufferTarget>,
    /// Search threads per fill
    pub workers: usize,
    /// Pause between full scans of the targets
    pub check_interval: Duration,
    /// Interval between progress log lines during a fill
    pub report_interval: Duration,
    /// One replenishment thread per target
    pub parallel: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    #[error("Pattern '{0}' is configured more than once")]
    DuplicatePattern(String),

    #[error("No patterns configured")]
    NoPatterns,

    #[error("Master key material is required (set VANITY_MASTER_KEY)")]
    MissingMasterKey,

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_config(patterns: &[&str]) -> Config {
        Config {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            min_buffer: 5,
            master_key: Some("test-passphrase".into()),
            db_path: PathBuf::from("vanity_pool.db"),
            check_interval: 60,
            workers: Some(2),
            report_interval: 10,
            pattern_type: PatternType::Suffix,
            case_insensitive: false,
            parallel: false,
            store_timeout_ms: 5000,
            log_json: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = make_test_config(&["SNOW", "SB"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_from_cli() {
        let config =
            Config::try_parse_from(["vanity_pool", "--master-key", "k", "--db-path", "x.db"])
                .unwrap();
        assert_eq!(config.patterns, vec!["SNOW".to_string(), "SB".to_string()]);
        assert_eq!(config.min_buffer, 5);
        assert_eq!(config.pattern_type, PatternType::Suffix);
        assert!(!config.case_insensitive);
    }

    #[test]
    fn test_comma_separated_patterns() {
        let config =
            Config::try_parse_from(["vanity_pool", "--patterns", "AB,CD,EFG", "--master-key", "k"])
                .unwrap();
        assert_eq!(config.patterns, vec!["AB", "CD", "EFG"]);
    }

    #[test]
    fn test_missing_master_key() {
        let mut config = make_test_config(&["SB"]);
        config.master_key = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingMasterKey)));

        config.master_key = Some(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::MissingMasterKey)));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = make_test_config(&["S0W"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern(PatternError::NotBase58(_)))
        ));
    }

    #[test]
    fn test_duplicate_pattern() {
        let config = make_test_config(&["SB", "SB"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePattern(_))
        ));
    }

    #[test]
    fn test_case_insensitive_duplicate_pattern() {
        let mut config = make_test_config(&["sb", "SB"]);
        assert!(config.validate().is_ok());

        config.case_insensitive = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePattern(p)) if p == "sb"
        ));
    }

    #[test]
    fn test_trailing_comma_is_ignored() {
        let config = Config::try_parse_from([
            "vanity_pool",
            "--patterns",
            "SNOW,SB,",
            "--master-key",
            "k",
        ])
        .unwrap();
        let pool = config.pool_config().unwrap();
        let names: Vec<_> = pool.targets.iter().map(|t| t.pattern.pattern()).collect();
        assert_eq!(names, vec!["SNOW", "SB"]);
    }

    #[test]
    fn test_only_blank_patterns() {
        let config = make_test_config(&[" ", ""]);
        assert!(matches!(config.validate(), Err(ConfigError::NoPatterns)));
    }

    #[test]
    fn test_pool_config_targets_keep_order() {
        let config = make_test_config(&["SNOW", " SB "]);
        let pool = config.pool_config().unwrap();

        let names: Vec<_> = pool.targets.iter().map(|t| t.pattern.pattern()).collect();
        assert_eq!(names, vec!["SNOW", "SB"]);
        assert!(pool.targets.iter().all(|t| t.min_ready == 5));
        assert!(pool.targets.iter().all(|t| t.pattern.case_sensitive()));
        assert_eq!(pool.workers, 2);
        assert_eq!(pool.check_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_case_insensitive_targets() {
        let mut config = make_test_config(&["SNOW"]);
        config.case_insensitive = true;
        let pool = config.pool_config().unwrap();
        assert!(!pool.targets[0].pattern.case_sensitive());
        assert_eq!(pool.targets[0].pattern.pattern(), "snow");
    }

    #[test]
    fn test_debug_redacts_master_key() {
        let config = make_test_config(&["SB"]);
        let shown = format!("{:?}", config);
        assert!(!shown.contains("test-passphrase"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_parallel_worker_split() {
        let mut config = make_test_config(&["SNOW", "SB"]);
        config.workers = None;
        config.parallel = true;
        assert!(config.worker_count() >= 1);
        assert!(config.worker_count() <= num_cpus::get());
    }
}
