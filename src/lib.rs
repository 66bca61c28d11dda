//! # vanity_pool
//!
//! Keeps a standing pool of pre-generated Solana vanity keypairs so callers
//! can claim a branded address without paying the search cost on request.
//!
//! ## Architecture
//!
//! - `crypto`: Keypair generation, address encoding, at-rest sealing
//! - `matcher`: Pattern matching strategies
//! - `store`: Durable pool persistence (SQLite)
//! - `worker`: Parallel keypair search and the fill loop
//! - `replenish`: Per-pattern buffer controller
//! - `config`: Runtime configuration

pub mod config;
pub mod crypto;
pub mod error;
pub mod matcher;
pub mod replenish;
pub mod store;
pub mod worker;

pub use config::{BufferTarget, Config, PoolConfig};
pub use crypto::{Keypair, KeypairCandidate, SealedSecret, SecretSealer};
pub use error::{PoolError, Result};
pub use matcher::{MatchResult, Pattern, PatternType};
pub use replenish::{BufferState, ReplenishmentController};
pub use store::{PoolStore, SqlitePoolStore};
pub use worker::{FillReport, SearchWorker, WorkerPool};
