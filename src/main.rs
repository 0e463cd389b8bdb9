/// betfeed — Feed Worker
///
/// What it does:
///   1. Every poll interval, walks every configured sport and tournament page
///   2. Upcoming fixtures get their three-way odds and are stored as matches
///   3. Finished results settle open bets: credit winners, queue a message per bet
///
/// Messages land in the `notifications` outbox; `notify-relay` delivers them.
///
/// Run:
///   cargo run --bin feed-worker

use anyhow::{Context, Result};
use bet_store::BetStore;
use dotenv::dotenv;
use feed_client::FeedClient;
use logger::EventLogger;
use settlement::{PassReport, Worker, WorkerConfig};
use std::env;
use std::fs::File;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cfg = WorkerConfig::from_env();

    info!("=== betfeed worker ===");
    info!("DB: {}", cfg.db_path.display());
    info!("Logs: {}", cfg.log_dir.display());

    // Single instance lock
    let lock_file_path = env::temp_dir().join("betfeed_worker.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of feed-worker is already running! Exiting.");
            return Ok(());
        }
    };

    let catalog = cfg.catalog()?;
    info!(
        "Catalog: {} sports, {} tournaments",
        catalog.sports.len(),
        catalog.tournament_count()
    );
    info!("Poll interval: {}s", cfg.poll_interval.as_secs());

    let store = BetStore::open(&cfg.db_path)
        .with_context(|| format!("open db at {}", cfg.db_path.display()))?;
    let client = FeedClient::new(cfg.feed_client_config()).context("build feed client")?;
    let audit = EventLogger::new(cfg.log_dir.clone());

    let mut worker = Worker::new(store, client, catalog, cfg.odds_concurrency, audit);

    loop {
        info!("--- Feed pass ---");

        match worker.run_pass().await {
            Ok(report) => log_report(&report),
            // Store is unusable this round (disk, permissions, corruption).
            // Keep the process alive and retry next interval.
            Err(e) => error!("pass aborted, store failure: {}", e),
        }

        sleep(cfg.poll_interval).await;
    }
}

fn log_report(report: &PassReport) {
    info!(
        tournaments_ok = report.tournaments_ok,
        tournaments_failed = report.tournaments_failed,
        inserted = report.ingest.inserted,
        duplicates = report.ingest.duplicates,
        matches_settled = report.settlement.settled.len(),
        bets_settled = report.settlement.bets_settled(),
        left_open = report.settlement.left_open,
        errors = report.total_errors(),
        "pass done"
    );
}
