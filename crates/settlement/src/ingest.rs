//! Ingestion writer: priced fixtures → `matches` rows.
//!
//! The same fixture comes back every polling interval, so a duplicate is the
//! normal case and counts as success.

use bet_store::{BetStore, NewMatch, SportId, StoreError};
use tracing::{debug, warn};

use crate::odds::PricedFixture;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    /// Missing teams or kickoff.
    pub skipped: usize,
    /// Persistence errors other than duplicates.
    pub failed: usize,
}

impl IngestReport {
    pub fn absorb(&mut self, other: &IngestReport) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Write fixtures for one league. `Err` only for failures that make the
/// store unusable, or when the tournament row itself cannot be ensured.
pub fn ingest_fixtures(
    store: &mut BetStore,
    sport_id: SportId,
    league_name: &str,
    fixtures: &[PricedFixture],
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport::default();
    if fixtures.is_empty() {
        return Ok(report);
    }

    let tournament_id = store.ensure_tournament(sport_id, league_name)?;

    for fixture in fixtures {
        let ev = &fixture.event;
        let (Some(home), Some(away), Some(kickoff)) = (&ev.home, &ev.away, ev.kickoff) else {
            debug!(event_id = %ev.event_id, "fixture without teams or kickoff, skipping");
            report.skipped += 1;
            continue;
        };

        let new_match = NewMatch {
            tournament_id,
            date: kickoff,
            player1: home.clone(),
            player2: away.clone(),
            win1: fixture.odds.win1,
            draw: fixture.odds.draw,
            win2: fixture.odds.win2,
        };

        match store.insert_match(&new_match) {
            Ok(id) => {
                debug!(match_id = id, "{} - {} stored", home, away);
                report.inserted += 1;
            }
            Err(e) if e.is_duplicate() => report.duplicates += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(event_id = %ev.event_id, "match insert failed: {}", e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
