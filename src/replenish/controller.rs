//! Replenishment controller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{BufferTarget, PoolConfig};
use crate::crypto::SecretSealer;
use crate::error::{PoolError, Result};
use crate::store::PoolStore;
use crate::worker::{FillReport, SearchWorker};

/// Upper bound on how long an interval wait goes without checking shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Per-pattern buffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// At or above the minimum; nothing to do
    Idle,
    /// Below the minimum; the search worker is closing the gap
    Filling,
}

impl BufferState {
    pub fn for_counts(ready: usize, min_ready: usize) -> Self {
        if ready < min_ready {
            BufferState::Filling
        } else {
            BufferState::Idle
        }
    }
}

/// Result of evaluating one buffer target.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub pattern: String,
    pub ready: usize,
    pub min_ready: usize,
    pub state: BufferState,
    /// Present when the target was below its minimum
    pub fill: Option<FillReport>,
}

/// Totals across every fill the controller has run.
#[derive(Debug, Default)]
pub struct ControllerStats {
    pub attempts: AtomicU64,
    pub found: AtomicU64,
    pub failures: AtomicU64,
}

impl ControllerStats {
    pub fn total_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn total_found(&self) -> u64 {
        self.found.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Keeps every configured pattern's ready count at or above its minimum.
///
/// Errors from one pattern are returned as values and logged in
/// one place; they never stop the loop.
#[derive(Clone)]
pub struct ReplenishmentController {
    config: Arc<PoolConfig>,
    store: Arc<dyn PoolStore>,
    sealer: Arc<SecretSealer>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ControllerStats>,
}

impl ReplenishmentController {
    pub fn new(
        config: Arc<PoolConfig>,
        store: Arc<dyn PoolStore>,
        sealer: Arc<SecretSealer>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            store,
            sealer,
            shutdown,
            stats: Arc::new(ControllerStats::default()),
        }
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Checks one target and fills its deficit if it is below the minimum.
    pub fn evaluate(&self, target: &BufferTarget) -> Result<Evaluation> {
        let pattern = &target.pattern;
        let ready = self.store.count_ready(pattern)?;
        let state = BufferState::for_counts(ready, target.min_ready);

        let fill = match state {
            BufferState::Idle => None,
            BufferState::Filling => {
                let worker = SearchWorker::new(self.store.as_ref(), &self.sealer, &self.shutdown)
                    .with_workers(self.config.workers)
                    .with_report_interval(self.config.report_interval);
                Some(worker.fill_pattern(pattern, target.min_ready - ready)?)
            }
        };

        Ok(Evaluation {
            pattern: pattern.pattern().to_string(),
            ready,
            min_ready: target.min_ready,
            state,
            fill,
        })
    }

    /// Evaluates every target once, in configured order.
    ///
    /// Returns the number of targets whose evaluation failed.
    pub fn run_cycle(&self) -> usize {
        let mut failures = 0;
        for target in &self.config.targets {
            if self.is_stopped() {
                break;
            }
            let result = self.evaluate(target);
            if result.is_err() {
                failures += 1;
            }
            self.record(target, &result);
        }
        failures
    }

    /// Logs the ready/reserved/used breakdown of every target.
    pub fn log_status(&self) {
        for target in &self.config.targets {
            let pattern = &target.pattern;
            match self.store.status_counts(pattern) {
                Ok(counts) => tracing::info!(
                    pattern = %pattern,
                    ready = counts.ready,
                    reserved = counts.reserved,
                    used = counts.used,
                    min_ready = target.min_ready,
                    "Pool status"
                ),
                Err(e) => tracing::warn!(pattern = %pattern, error = %e, "Could not read pool status"),
            }
        }
    }

    /// Runs until shutdown is signalled.
    pub fn run(&self) -> Result<()> {
        if self.config.parallel {
            self.run_parallel()
        } else {
            self.run_sequential();
            Ok(())
        }
    }

    fn run_sequential(&self) {
        while !self.is_stopped() {
            self.run_cycle();
            if !self.wait_interval() {
                break;
            }
        }
    }

    /// One replenishment thread per target; outcomes come back over a
    /// channel so logging stays on this thread.
    fn run_parallel(&self) -> Result<()> {
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, Result<Evaluation>)>();
        let mut handles = Vec::with_capacity(self.config.targets.len());

        for (index, target) in self.config.targets.iter().enumerate() {
            let controller = self.clone();
            let target = target.clone();
            let result_tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("replenish-{}", target.pattern.pattern()))
                .spawn(move || {
                    while !controller.is_stopped() {
                        let result = controller.evaluate(&target);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                        if !controller.wait_interval() {
                            break;
                        }
                    }
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.shutdown.store(true, Ordering::Relaxed);
                    drop(tx);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Worker(e));
                }
            }
        }
        drop(tx);

        for (index, result) in rx.iter() {
            self.record(&self.config.targets[index], &result);
        }

        for handle in handles {
            let name = handle.thread().name().unwrap_or("replenish").to_string();
            if handle.join().is_err() {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(thread = %name, "Replenishment thread panicked");
            }
        }
        Ok(())
    }

    /// Sleeps for the check interval. Returns false if shutdown arrived first.
    fn wait_interval(&self) -> bool {
        let deadline = Instant::now() + self.config.check_interval;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    /// The single place evaluation outcomes are logged and counted.
    fn record(&self, target: &BufferTarget, result: &Result<Evaluation>) {
        let pattern = &target.pattern;
        match result {
            Ok(Evaluation { fill: None, ready, .. }) => {
                tracing::debug!(
                    pattern = %pattern,
                    ready = *ready,
                    min_ready = target.min_ready,
                    "Buffer satisfied"
                );
            }
            Ok(Evaluation {
                fill: Some(report),
                ready,
                ..
            }) => {
                self.stats.attempts.fetch_add(report.attempts, Ordering::Relaxed);
                self.stats.found.fetch_add(report.found as u64, Ordering::Relaxed);

                if report.cancelled {
                    tracing::warn!(
                        pattern = %pattern,
                        found = report.found,
                        target = report.target,
                        attempts = report.attempts,
                        "Fill interrupted by shutdown"
                    );
                } else {
                    tracing::info!(
                        pattern = %pattern,
                        ready_before = *ready,
                        found = report.found,
                        duplicates = report.duplicates,
                        attempts = report.attempts,
                        elapsed_secs = report.elapsed.as_secs_f64(),
                        keys_per_sec = report.rate() as u64,
                        "Buffer replenished"
                    );
                }
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                let transient = matches!(e, PoolError::Store(s) if s.is_transient());
                tracing::error!(
                    pattern = %pattern,
                    error = %e,
                    transient,
                    "Replenishment failed, retrying next cycle"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Pattern, PatternType};
    use crate::store::{
        Database, InsertOutcome, NewPoolEntry, PoolEntry, SqlitePoolStore, StatusCounts,
        StoreError,
    };
    use std::sync::atomic::AtomicUsize;

    /// Counts inserts and can fail or panic in `count_ready` for one pattern.
    struct CountingStore {
        inner: SqlitePoolStore,
        inserts: AtomicUsize,
        broken_pattern: Option<String>,
        panic_pattern: Option<String>,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: SqlitePoolStore::new(Database::open_in_memory().unwrap()),
                inserts: AtomicUsize::new(0),
                broken_pattern: None,
                panic_pattern: None,
            }
        }

        fn inserts(&self) -> usize {
            self.inserts.load(Ordering::SeqCst)
        }
    }

    impl PoolStore for CountingStore {
        fn count_ready(&self, pattern: &Pattern) -> std::result::Result<usize, StoreError> {
            if self.broken_pattern.as_deref() == Some(pattern.pattern()) {
                return Err(StoreError::Corrupt("unreadable".into()));
            }
            if self.panic_pattern.as_deref() == Some(pattern.pattern()) {
                panic!("count_ready blew up for {}", pattern.pattern());
            }
            self.inner.count_ready(pattern)
        }

        fn try_insert(
            &self,
            entry: &NewPoolEntry,
        ) -> std::result::Result<InsertOutcome, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.try_insert(entry)
        }

        fn status_counts(&self, pattern: &Pattern) -> std::result::Result<StatusCounts, StoreError> {
            self.inner.status_counts(pattern)
        }

        fn find_by_public_id(
            &self,
            public_id: &str,
        ) -> std::result::Result<Option<PoolEntry>, StoreError> {
            self.inner.find_by_public_id(public_id)
        }
    }

    fn suffix(text: &str) -> Pattern {
        Pattern::new(text, PatternType::Suffix, true)
    }

    fn target(pattern: &str, min_ready: usize) -> BufferTarget {
        BufferTarget {
            pattern: suffix(pattern),
            min_ready,
        }
    }

    fn make_config(targets: Vec<BufferTarget>, parallel: bool) -> Arc<PoolConfig> {
        Arc::new(PoolConfig {
            targets,
            workers: 1,
            check_interval: Duration::from_millis(200),
            report_interval: Duration::from_secs(10),
            parallel,
        })
    }

    fn make_controller(
        config: Arc<PoolConfig>,
        store: Arc<CountingStore>,
    ) -> (ReplenishmentController, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let sealer = Arc::new(SecretSealer::from_material("controller-tests").unwrap());
        let controller = ReplenishmentController::new(config, store, sealer, shutdown.clone());
        (controller, shutdown)
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(60);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    fn test_buffer_state_transitions() {
        assert_eq!(BufferState::for_counts(0, 3), BufferState::Filling);
        assert_eq!(BufferState::for_counts(2, 3), BufferState::Filling);
        assert_eq!(BufferState::for_counts(3, 3), BufferState::Idle);
        assert_eq!(BufferState::for_counts(9, 3), BufferState::Idle);
        assert_eq!(BufferState::for_counts(0, 0), BufferState::Idle);
    }

    #[test]
    fn test_fills_to_minimum() {
        let store = Arc::new(CountingStore::new());
        let config = make_config(vec![target("AB", 3)], false);
        let (controller, _) = make_controller(config.clone(), store.clone());

        let eval = controller.evaluate(&config.targets[0]).unwrap();
        assert_eq!(eval.state, BufferState::Filling);
        assert_eq!(eval.ready, 0);
        assert_eq!(eval.fill.as_ref().unwrap().found, 3);
        assert_eq!(store.count_ready(&suffix("AB")).unwrap(), 3);
    }

    #[test]
    fn test_prefix_keys_do_not_fill_suffix_buffer() {
        let store = Arc::new(CountingStore::new());
        let (controller, _) = make_controller(make_config(vec![], false), store.clone());
        let prefix = BufferTarget {
            pattern: Pattern::new("AB", PatternType::Prefix, true),
            min_ready: 2,
        };

        controller.evaluate(&prefix).unwrap();
        assert_eq!(store.count_ready(&prefix.pattern).unwrap(), 2);

        let eval = controller.evaluate(&target("AB", 2)).unwrap();
        assert_eq!(eval.ready, 0);
        assert_eq!(eval.state, BufferState::Filling);
        assert_eq!(eval.fill.unwrap().found, 2);
        assert_eq!(store.count_ready(&suffix("AB")).unwrap(), 2);

        let suffix_ids: Vec<String> = store.inner.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT public_id FROM vanity_keypairs WHERE match_type = 'suffix'")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
            let ids = rows.map(|r| r.unwrap()).collect();
            ids
        });
        assert_eq!(suffix_ids.len(), 2);
        assert!(suffix_ids.iter().all(|id| id.ends_with("AB")));
    }

    #[test]
    fn test_evaluation_is_idempotent_when_full() {
        let store = Arc::new(CountingStore::new());
        let config = make_config(vec![target("E", 2)], false);
        let (controller, _) = make_controller(config.clone(), store.clone());

        controller.evaluate(&config.targets[0]).unwrap();
        let inserts_after_fill = store.inserts();
        assert!(inserts_after_fill >= 2);

        let first = controller.evaluate(&config.targets[0]).unwrap();
        let second = controller.evaluate(&config.targets[0]).unwrap();
        assert_eq!(first.state, BufferState::Idle);
        assert_eq!(second.state, BufferState::Idle);
        assert!(second.fill.is_none());
        assert_eq!(store.inserts(), inserts_after_fill);
    }

    #[test]
    fn test_partial_buffer_fills_only_deficit() {
        let store = Arc::new(CountingStore::new());
        let (controller, _) = make_controller(make_config(vec![], false), store.clone());

        controller.evaluate(&target("F", 1)).unwrap();
        let eval = controller.evaluate(&target("F", 3)).unwrap();
        assert_eq!(eval.ready, 1);
        assert_eq!(eval.fill.unwrap().found, 2);
        assert_eq!(store.count_ready(&suffix("F")).unwrap(), 3);
    }

    #[test]
    fn test_failing_pattern_does_not_block_others() {
        let mut counting = CountingStore::new();
        counting.broken_pattern = Some("G".into());
        let store = Arc::new(counting);
        let config = make_config(vec![target("G", 2), target("H", 2)], false);
        let (controller, _) = make_controller(config, store.clone());

        assert_eq!(controller.run_cycle(), 1);
        assert_eq!(store.count_ready(&suffix("H")).unwrap(), 2);
        assert_eq!(controller.stats().total_failures(), 1);
        assert_eq!(controller.stats().total_found(), 2);

        // The next cycle retries the failing pattern and leaves H alone.
        let inserts = store.inserts();
        assert_eq!(controller.run_cycle(), 1);
        assert_eq!(store.inserts(), inserts);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let store = Arc::new(CountingStore::new());
        let config = make_config(vec![target("J", 2)], false);
        let (controller, shutdown) = make_controller(config, store.clone());

        let runner = {
            let controller = controller.clone();
            thread::spawn(move || controller.run())
        };

        wait_for(|| store.count_ready(&suffix("J")).unwrap() >= 2);
        shutdown.store(true, Ordering::Relaxed);
        runner.join().unwrap().unwrap();

        assert_eq!(store.count_ready(&suffix("J")).unwrap(), 2);
    }

    #[test]
    fn test_parallel_mode_fills_every_pattern() {
        let store = Arc::new(CountingStore::new());
        let config = make_config(vec![target("K", 2), target("M", 2)], true);
        let (controller, shutdown) = make_controller(config, store.clone());

        let runner = {
            let controller = controller.clone();
            thread::spawn(move || controller.run())
        };

        wait_for(|| {
            store.count_ready(&suffix("K")).unwrap() >= 2
                && store.count_ready(&suffix("M")).unwrap() >= 2
        });
        shutdown.store(true, Ordering::Relaxed);
        runner.join().unwrap().unwrap();

        assert_eq!(store.count_ready(&suffix("K")).unwrap(), 2);
        assert_eq!(store.count_ready(&suffix("M")).unwrap(), 2);
        assert_eq!(controller.stats().total_found(), 4);
    }

    #[test]
    fn test_parallel_thread_panic_is_contained() {
        let mut counting = CountingStore::new();
        counting.panic_pattern = Some("P".into());
        let store = Arc::new(counting);
        let config = make_config(vec![target("P", 1), target("Q", 2)], true);
        let (controller, shutdown) = make_controller(config, store.clone());

        let runner = {
            let controller = controller.clone();
            thread::spawn(move || controller.run())
        };

        wait_for(|| store.count_ready(&suffix("Q")).unwrap() >= 2);
        shutdown.store(true, Ordering::Relaxed);
        runner.join().unwrap().unwrap();

        assert_eq!(store.count_ready(&suffix("Q")).unwrap(), 2);
        assert_eq!(controller.stats().total_failures(), 1);
    }

    #[test]
    fn test_log_status_reads_counts() {
        let store = Arc::new(CountingStore::new());
        let config = make_config(vec![target("N", 1)], false);
        let (controller, _) = make_controller(config, store.clone());
        controller.run_cycle();
        controller.log_status();
        assert_eq!(store.status_counts(&suffix("N")).unwrap().ready, 1);
    }
}
