//! Worker pool management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::crypto::KeypairCandidate;
use crate::matcher::Pattern;

use super::cpu::{CpuWorker, WorkerStats};

/// Matches waiting to be sealed. Workers block once this many are queued.
const RESULT_QUEUE_CAPACITY: usize = 64;

/// Manages a pool of CPU workers searching for one pattern.
pub struct WorkerPool {
    /// Number of workers
    num_workers: usize,
    /// The pattern to search for
    pattern: Pattern,
    /// Worker thread handles (Option to allow taking during join)
    handles: Option<Vec<JoinHandle<()>>>,
    /// Channel receiver for matches
    result_rx: Receiver<KeypairCandidate>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
    /// Shared statistics
    stats: Arc<WorkerStats>,
    /// Start time
    start_time: Instant,
}

impl WorkerPool {
    /// Creates a new worker pool with the specified number of workers.
    pub fn new(num_workers: usize, pattern: Pattern) -> std::io::Result<Self> {
        let (result_tx, result_rx) = bounded(RESULT_QUEUE_CAPACITY);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(WorkerStats::new());

        let handles = match Self::spawn_workers(
            num_workers.max(1),
            &pattern,
            result_tx,
            &stop_flag,
            &stats,
        ) {
            Ok(handles) => handles,
            Err((err, spawned)) => {
                stop_flag.store(true, Ordering::Relaxed);
                drop(result_rx);
                for handle in spawned {
                    let _ = handle.join();
                }
                return Err(err);
            }
        };

        Ok(Self {
            num_workers: handles.len(),
            pattern,
            handles: Some(handles),
            result_rx,
            stop_flag,
            stats,
            start_time: Instant::now(),
        })
    }

    /// Spawns worker threads, returning those already started on failure.
    fn spawn_workers(
        num_workers: usize,
        pattern: &Pattern,
        result_tx: Sender<KeypairCandidate>,
        stop_flag: &Arc<AtomicBool>,
        stats: &Arc<WorkerStats>,
    ) -> Result<Vec<JoinHandle<()>>, (std::io::Error, Vec<JoinHandle<()>>)> {
        let mut handles = Vec::with_capacity(num_workers);

        for id in 0..num_workers {
            let pattern = pattern.clone();
            let result_tx = result_tx.clone();
            let stop_flag = stop_flag.clone();
            let stats = stats.clone();

            let spawned = thread::Builder::new()
                .name(format!("vanity-{}-{}", pattern.pattern(), id))
                .spawn(move || {
                    let worker = CpuWorker::new(id, pattern, result_tx, stop_flag, stats);
                    worker.run();
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => return Err((err, handles)),
            }
        }

        Ok(handles)
    }

    /// Waits for a match with a timeout.
    ///
    /// Returns `Some(candidate)` if a match is found, `None` if timeout expires.
    pub fn wait_for_result(&self, timeout: Duration) -> Option<KeypairCandidate> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Stops all workers and waits for them to exit.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        // Dropping the receiver wakes any worker blocked on a full queue.
        self.result_rx = crossbeam_channel::never();
        if let Some(handles) = self.handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns the pattern being searched for.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the total keys generated across all workers.
    pub fn total_keys(&self) -> u64 {
        self.stats.total_keys()
    }

    /// Returns the total matches found.
    pub fn total_matches(&self) -> u64 {
        self.stats.total_matches()
    }

    /// Returns the elapsed time since the pool was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the current generation rate (keys per second).
    pub fn keys_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_keys() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns true if the pool has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
