//! Solana Vanity Keypair Pool
//!
//! Usage:
//!   VANITY_MASTER_KEY=... vanity_pool                   # Keep 5 of each default pattern (SNOW, SB)
//!   vanity_pool -p SNOW,SB -m 20 --parallel              # 20 per pattern, one thread per pattern
//!   vanity_pool -p snow --case-insensitive -i 300        # Check the buffer every 5 minutes

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vanity_pool::store::{Database, SqlitePoolStore};
use vanity_pool::{Config, ReplenishmentController, SecretSealer};

fn main() {
    let config = Config::parse();
    init_tracing(config.log_json);

    // Validate configuration
    let pool_config = match config.pool_config() {
        Ok(pool_config) => Arc::new(pool_config),
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            process::exit(1);
        }
    };

    // No operation can succeed without the sealing key, so fail fast.
    let sealer = match SecretSealer::from_optional_material(config.master_key.as_deref()) {
        Ok(sealer) => Arc::new(sealer),
        Err(e) => {
            tracing::error!(error = %e, "Cannot build secret sealer");
            process::exit(1);
        }
    };

    let store = match Database::open(&config.db_path, config.store_timeout()) {
        Ok(db) => Arc::new(SqlitePoolStore::new(db)),
        Err(e) => {
            tracing::error!(path = %config.db_path.display(), error = %e, "Cannot open pool database");
            process::exit(1);
        }
    };

    let patterns: Vec<String> = pool_config
        .targets
        .iter()
        .map(|t| t.pattern.to_string())
        .collect();
    tracing::info!(
        patterns = ?patterns,
        min_buffer = config.min_buffer,
        workers = pool_config.workers,
        parallel = pool_config.parallel,
        check_interval_secs = pool_config.check_interval.as_secs(),
        db_path = %config.db_path.display(),
        "Vanity pool starting"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(e) = ctrlc_handler(shutdown.clone()) {
        tracing::error!(error = %e, "Error setting Ctrl-C handler");
        process::exit(1);
    }

    let controller = ReplenishmentController::new(pool_config, store, sealer, shutdown);
    controller.log_status();

    if let Err(e) = controller.run() {
        tracing::error!(error = %e, "Replenishment stopped");
        process::exit(1);
    }

    let stats = controller.stats();
    tracing::info!(
        total_attempts = stats.total_attempts(),
        total_found = stats.total_found(),
        failed_evaluations = stats.total_failures(),
        "Stopped by user; generated {} keys",
        format_number(stats.total_attempts())
    );
}

fn init_tracing(json: bool) {
    // RUST_LOG=vanity_pool=debug for verbose output. Secrets are never logged.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vanity_pool=info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn ctrlc_handler(stop_flag: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown requested, finishing current step");
        stop_flag.store(true, Ordering::Relaxed);
    })
}
