//! The fill loop: search, seal and persist until a pattern's deficit is closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::crypto::{KeypairCandidate, SecretSealer};
use crate::error::Result;
use crate::matcher::Pattern;
use crate::store::{InsertOutcome, NewPoolEntry, PoolStore};

use super::WorkerPool;

/// How long the fill loop blocks on the match queue before re-checking
/// cancellation and progress reporting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Summary of one `fill_pattern` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    /// The pattern text
    pub pattern: String,
    /// Entries requested
    pub target: usize,
    /// Entries inserted
    pub found: usize,
    /// Matches rejected by the store as already pooled
    pub duplicates: usize,
    /// Keypairs generated
    pub attempts: u64,
    /// Wall time spent searching
    pub elapsed: Duration,
    /// Whether shutdown interrupted the search
    pub cancelled: bool,
}

impl FillReport {
    /// Keypairs generated per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }

    /// Whether the full target was inserted.
    pub fn is_complete(&self) -> bool {
        self.found >= self.target
    }
}

/// Searches for keypairs matching a pattern and stores them sealed.
///
/// There is no attempt cap: expected work is `58^len` keys per match, and
/// stopping early would starve the buffer. Progress is logged instead, and
/// the shared shutdown flag aborts the search between matches.
pub struct SearchWorker<'a> {
    store: &'a dyn PoolStore,
    sealer: &'a SecretSealer,
    shutdown: &'a AtomicBool,
    workers: usize,
    report_interval: Duration,
}

impl<'a> SearchWorker<'a> {
    pub fn new(store: &'a dyn PoolStore, sealer: &'a SecretSealer, shutdown: &'a AtomicBool) -> Self {
        Self {
            store,
            sealer,
            shutdown,
            workers: 1,
            report_interval: Duration::from_secs(10),
        }
    }

    /// Sets the number of CPU search threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the interval between progress log lines.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Inserts `target_count` new entries for `pattern`.
    ///
    /// Duplicates do not count toward the target. Any other store failure
    /// aborts the fill and is returned to the caller.
    pub fn fill_pattern(&self, pattern: &Pattern, target_count: usize) -> Result<FillReport> {
        let mut report = FillReport {
            pattern: pattern.pattern().to_string(),
            target: target_count,
            found: 0,
            duplicates: 0,
            attempts: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };
        if target_count == 0 {
            return Ok(report);
        }

        tracing::info!(
            pattern = %pattern,
            target = target_count,
            workers = self.workers,
            expected_attempts = pattern.estimated_difficulty(),
            difficulty = %pattern.difficulty_description(),
            "Starting search"
        );

        let pool = WorkerPool::new(self.workers, pattern.clone())?;
        let mut last_report = Instant::now();

        let outcome = loop {
            if report.found >= target_count {
                break Ok(());
            }
            if self.shutdown.load(Ordering::Relaxed) {
                report.cancelled = true;
                break Ok(());
            }

            if let Some(candidate) = pool.wait_for_result(POLL_INTERVAL) {
                match self.persist(pattern, candidate) {
                    Ok(InsertOutcome::Inserted(entry)) => {
                        report.found += 1;
                        tracing::info!(
                            pattern = %report.pattern,
                            public_id = %entry.public_id,
                            found = report.found,
                            target = target_count,
                            "Stored vanity keypair"
                        );
                    }
                    Ok(InsertOutcome::DuplicatePublicId) => report.duplicates += 1,
                    Err(e) => break Err(e),
                }
            }

            if last_report.elapsed() >= self.report_interval {
                tracing::info!(
                    pattern = %report.pattern,
                    attempts = pool.total_keys(),
                    found = report.found,
                    target = target_count,
                    elapsed_secs = pool.elapsed().as_secs(),
                    keys_per_sec = pool.keys_per_second() as u64,
                    "Search progress"
                );
                last_report = Instant::now();
            }
        };

        report.attempts = pool.total_keys();
        report.elapsed = pool.elapsed();
        pool.join();
        outcome?;

        Ok(report)
    }

    /// Seals a matched candidate and offers it to the store.
    fn persist(&self, pattern: &Pattern, candidate: KeypairCandidate) -> Result<InsertOutcome> {
        let sealed_secret = self.sealer.seal(&candidate.secret_key[..])?;
        let entry = NewPoolEntry {
            public_id: candidate.public_id,
            sealed_secret,
            pattern: pattern.pattern().to_string(),
            match_type: pattern.pattern_type(),
            case_sensitive: pattern.case_sensitive(),
        };
        Ok(self.store.try_insert(&entry)?)
    }
}
