//! Keypair search workers.
//!
//! This module provides:
//! - Multi-threaded CPU workers that generate and match keypairs
//! - A worker pool per pattern with shared progress statistics
//! - The fill loop that seals and persists matches until a target is met

mod cpu;
mod pool;
mod search;

pub use cpu::{CpuWorker, WorkerStats};
pub use pool::WorkerPool;
pub use search::{FillReport, SearchWorker};
