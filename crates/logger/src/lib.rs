/// betfeed — Logger
/// JSONL audit stream, one file per UTC day

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Audit logging must never stop the pipeline.
    pub fn log_quiet<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.log(event) {
            tracing::warn!("audit log write failed: {}", e);
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct FeedStatusEvent {
    pub ts:          String,
    pub event:       &'static str,   // "FEED_STATUS"
    pub sport:       String,
    pub tournament:  String,         // config path, e.g. "/france/ligue-1/"
    pub ok:          bool,
    pub message:     String,
    pub fixtures:    usize,
    pub results:     usize,
}

#[derive(Serialize, Debug)]
pub struct MatchSettledEvent {
    pub ts:          String,
    pub event:       &'static str,   // "MATCH_SETTLED"
    pub match_id:    i64,
    pub fixture:     String,
    pub home_goals:  u32,
    pub away_goals:  u32,
    pub outcome:     String,         // "WIN1" | "WIN2" | "DRAW"
    pub bets_won:    usize,
    pub bets_lost:   usize,
    pub paid_out:    String,         // decimal text
}

#[derive(Serialize, Debug)]
pub struct PassSummaryEvent {
    pub ts:                  String,
    pub event:               &'static str,   // "PASS_SUMMARY"
    pub duration_ms:         u64,
    pub tournaments_ok:      usize,
    pub tournaments_failed:  usize,
    pub matches_inserted:    usize,
    pub matches_duplicate:   usize,
    pub matches_settled:     usize,
    pub bets_settled:        usize,
    pub errors:              usize,
    pub aborted:             bool,
}
