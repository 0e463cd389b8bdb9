//! Worker configuration: environment (+ `.env` via dotenv in the binary) and
//! the sports catalog.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportFeed {
    pub name: String,
    pub base_url: String,
    /// Tournament page paths relative to `base_url`, e.g. `/france/ligue-1/`.
    pub tournaments: Vec<String>,
}

/// Ordered list of polled sports. JSON file format is a plain array of
/// `SportFeed` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SportsCatalog {
    pub sports: Vec<SportFeed>,
}

impl Default for SportsCatalog {
    fn default() -> Self {
        let feed = |name: &str, base_url: &str, paths: &[&str]| SportFeed {
            name: name.to_string(),
            base_url: base_url.to_string(),
            tournaments: paths.iter().map(|p| p.to_string()).collect(),
        };

        Self {
            sports: vec![
                feed(
                    "soccer",
                    "http://www.soccer24.com",
                    &[
                        "/england/premier-league/",
                        "/france/ligue-1/",
                        "/germany/bundesliga/",
                        "/italy/serie-a/",
                        "/netherlands/eredivisie/",
                        "/spain/laliga/",
                        "/europe/champions-league/",
                        "/europe/europa-league/",
                        "/world/world-cup/",
                        "/russia/premier-league/",
                    ],
                ),
                feed(
                    "icehockey",
                    "http://www.icehockey24.com",
                    &["/russia/khl/", "/usa/nhl/"],
                ),
            ],
        }
    }
}

impl SportsCatalog {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parse sports catalog")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read sports catalog {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn tournament_count(&self) -> usize {
        self.sports.iter().map(|s| s.tournaments.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub odds_concurrency: usize,
    pub requests_per_sec: u32,
    pub feed_sign: String,
    pub sports_file: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/betfeed.db"),
            log_dir: PathBuf::from("logs"),
            poll_interval: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(15),
            odds_concurrency: 4,
            requests_per_sec: 5,
            feed_sign: feed_client::DEFAULT_FEED_SIGN.to_string(),
            sports_file: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            db_path: lookup("BETFEED_DB_PATH").map(PathBuf::from).unwrap_or(d.db_path),
            log_dir: lookup("BETFEED_LOG_DIR").map(PathBuf::from).unwrap_or(d.log_dir),
            poll_interval: num("BETFEED_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.poll_interval),
            fetch_timeout: num("BETFEED_FETCH_TIMEOUT_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.fetch_timeout),
            odds_concurrency: num("BETFEED_ODDS_CONCURRENCY")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(d.odds_concurrency),
            requests_per_sec: num("BETFEED_REQUESTS_PER_SEC")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(d.requests_per_sec),
            feed_sign: lookup("BETFEED_FEED_SIGN")
                .filter(|s| !s.is_empty())
                .unwrap_or(d.feed_sign),
            sports_file: lookup("BETFEED_SPORTS_FILE").map(PathBuf::from),
        }
    }

    pub fn catalog(&self) -> Result<SportsCatalog> {
        match &self.sports_file {
            Some(path) => SportsCatalog::load(path),
            None => Ok(SportsCatalog::default()),
        }
    }

    pub fn feed_client_config(&self) -> feed_client::FeedClientConfig {
        feed_client::FeedClientConfig {
            feed_sign: self.feed_sign.clone(),
            timeout: self.fetch_timeout,
            requests_per_sec: self.requests_per_sec,
        }
    }
}
