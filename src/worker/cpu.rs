//! CPU-based worker for vanity keypair search.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use ed25519_dalek::SigningKey;

use crate::crypto::{encode_address_into, Keypair, KeypairCandidate, MAX_ADDRESS_LEN};
use crate::matcher::Pattern;

/// Statistics shared by the CPU workers of one pool.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total keys generated
    pub keys_generated: AtomicU64,
    /// Matches found
    pub matches_found: AtomicU64,
}

impl WorkerStats {
    /// Creates new worker stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total keys generated.
    pub fn total_keys(&self) -> u64 {
        self.keys_generated.load(Ordering::Relaxed)
    }

    /// Returns the total matches found.
    pub fn total_matches(&self) -> u64 {
        self.matches_found.load(Ordering::Relaxed)
    }
}

/// A CPU worker that generates and tests keypairs.
pub struct CpuWorker {
    /// Worker ID
    id: usize,
    /// The pattern to match against
    pattern: Pattern,
    /// Channel to send matches
    result_tx: Sender<KeypairCandidate>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl CpuWorker {
    /// Creates a new CPU worker.
    pub fn new(
        id: usize,
        pattern: Pattern,
        result_tx: Sender<KeypairCandidate>,
        stop_flag: Arc<AtomicBool>,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            id,
            pattern,
            result_tx,
            stop_flag,
            stats,
        }
    }

    /// Runs the worker loop.
    ///
    /// Generates keypairs and tests them against the pattern until:
    /// - Stop flag is set
    /// - Channel is closed
    ///
    /// Only matching keypairs ever leave this loop; misses are dropped (and
    /// their secrets zeroized) immediately.
    pub fn run(&self) {
        // Process in batches to reduce atomic operation overhead
        const BATCH_SIZE: u64 = 256;

        let mut rng = rand::thread_rng();
        let mut address = String::with_capacity(MAX_ADDRESS_LEN);

        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                break;
            }

            for generated in 1..=BATCH_SIZE {
                let signing_key = SigningKey::generate(&mut rng);
                encode_address_into(signing_key.verifying_key().as_bytes(), &mut address);

                if self.pattern.matches(&address).is_match() {
                    self.stats.matches_found.fetch_add(1, Ordering::Relaxed);

                    let candidate = Keypair::from_signing_key(signing_key).into_candidate();
                    if self.result_tx.send(candidate).is_err() {
                        // Receiver is gone; the pool is shutting down.
                        self.stats.keys_generated.fetch_add(generated, Ordering::Relaxed);
                        return;
                    }
                }
            }

            self.stats.keys_generated.fetch_add(BATCH_SIZE, Ordering::Relaxed);
        }
    }

    /// Returns the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }
}
