//! One polling pass over every configured sport and tournament.

use bet_store::{BetStore, SportId, StoreError};
use feed_client::FeedSource;
use feed_codec::{decode_feed, extract_events, DecodedEvent};
use logger::{now_iso, EventLogger, FeedStatusEvent, MatchSettledEvent, PassSummaryEvent};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SportsCatalog;
use crate::engine::{settle_results, SettlementReport};
use crate::ingest::{ingest_fixtures, IngestReport};
use crate::odds::resolve_fixture_odds;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassReport {
    pub tournaments_ok: usize,
    pub tournaments_failed: usize,
    pub odds_missing: usize,
    pub odds_rejected: usize,
    pub odds_failed: usize,
    pub ingest: IngestReport,
    pub settlement: SettlementReport,
    pub errors: usize,
}

impl PassReport {
    /// Row and fetch level problems of every stage.
    pub fn total_errors(&self) -> usize {
        self.errors + self.ingest.failed + self.settlement.errors + self.odds_failed
    }
}

pub struct Worker<S: FeedSource> {
    store: BetStore,
    source: S,
    catalog: SportsCatalog,
    odds_concurrency: usize,
    audit: EventLogger,
}

impl<S: FeedSource> Worker<S> {
    pub fn new(
        store: BetStore,
        source: S,
        catalog: SportsCatalog,
        odds_concurrency: usize,
        audit: EventLogger,
    ) -> Self {
        Self {
            store,
            source,
            catalog,
            odds_concurrency,
            audit,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &BetStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BetStore {
        &mut self.store
    }

    /// Run a full pass. Fetch and row-level failures are skipped and counted;
    /// `Err` means the store is unusable and the pass was aborted.
    pub async fn run_pass(&mut self) -> Result<PassReport, StoreError> {
        let started = Instant::now();
        let mut report = PassReport::default();

        let result = self.run_sports(&mut report).await;

        self.audit.log_quiet(&PassSummaryEvent {
            ts: now_iso(),
            event: "PASS_SUMMARY",
            duration_ms: started.elapsed().as_millis() as u64,
            tournaments_ok: report.tournaments_ok,
            tournaments_failed: report.tournaments_failed,
            matches_inserted: report.ingest.inserted,
            matches_duplicate: report.ingest.duplicates,
            matches_settled: report.settlement.settled.len(),
            bets_settled: report.settlement.bets_settled(),
            errors: report.total_errors(),
            aborted: result.is_err(),
        });

        result.map(|_| report)
    }

    async fn run_sports(&mut self, report: &mut PassReport) -> Result<(), StoreError> {
        let catalog = self.catalog.clone();

        for sport in &catalog.sports {
            let sport_id = match self.store.ensure_sport(&sport.name) {
                Ok(id) => id,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(sport = %sport.name, "cannot ensure sport row: {}", e);
                    report.errors += 1;
                    continue;
                }
            };

            for path in &sport.tournaments {
                self.process_tournament(&sport.name, sport_id, &sport.base_url, path, report)
                    .await?;
            }
        }

        Ok(())
    }

    async fn process_tournament(
        &mut self,
        sport_name: &str,
        sport_id: SportId,
        base_url: &str,
        path: &str,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        let page = match self.source.tournament_page(base_url, path).await {
            Ok(page) => page,
            Err(e) => {
                warn!(sport = sport_name, tournament = path, "fetch failed, skipping: {}", e);
                report.tournaments_failed += 1;
                self.log_feed_status(sport_name, path, false, &e.to_string(), 0, 0);
                return Ok(());
            }
        };
        report.tournaments_ok += 1;

        let mut fixture_count = 0;
        let mut result_count = 0;

        // Upcoming fixtures first, then results.
        if let Some(doc) = page.fixtures.as_deref().and_then(decode_feed) {
            debug!(tournament = path, skipped_rows = doc.skipped_rows, "fixtures decoded");
            let events = extract_events(&doc);
            fixture_count = events.len();

            match doc.league_name.as_deref() {
                Some(league) if !events.is_empty() => {
                    self.ingest_upcoming(sport_id, base_url, league, events, report)
                        .await?;
                }
                Some(_) => {}
                None => {
                    warn!(tournament = path, "fixtures feed has no league name, skipping ingest");
                    report.errors += 1;
                }
            }
        }

        if let Some(doc) = page.results.as_deref().and_then(decode_feed) {
            let finished: Vec<DecodedEvent> = extract_events(&doc)
                .into_iter()
                .filter(|e| e.score().is_some())
                .collect();
            result_count = finished.len();

            let settled = settle_results(&mut self.store, &finished)?;
            self.log_settled(&settled);
            report.settlement.absorb(settled);
        }

        info!(
            sport = sport_name,
            tournament = path,
            fixtures = fixture_count,
            results = result_count,
            "tournament processed"
        );
        self.log_feed_status(sport_name, path, true, "ok", fixture_count, result_count);

        Ok(())
    }

    async fn ingest_upcoming(
        &mut self,
        sport_id: SportId,
        base_url: &str,
        league: &str,
        events: Vec<DecodedEvent>,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        let stage =
            resolve_fixture_odds(&self.source, base_url, events, self.odds_concurrency).await;
        report.odds_missing += stage.missing;
        report.odds_rejected += stage.rejected;
        report.odds_failed += stage.failed;

        match ingest_fixtures(&mut self.store, sport_id, league, &stage.priced) {
            Ok(ingested) => {
                debug!(
                    league,
                    inserted = ingested.inserted,
                    duplicates = ingested.duplicates,
                    "fixtures ingested"
                );
                report.ingest.absorb(&ingested);
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(league, "ingest failed: {}", e);
                report.errors += 1;
                Ok(())
            }
        }
    }

    fn log_feed_status(
        &self,
        sport: &str,
        tournament: &str,
        ok: bool,
        message: &str,
        fixtures: usize,
        results: usize,
    ) {
        self.audit.log_quiet(&FeedStatusEvent {
            ts: now_iso(),
            event: "FEED_STATUS",
            sport: sport.to_string(),
            tournament: tournament.to_string(),
            ok,
            message: message.to_string(),
            fixtures,
            results,
        });
    }

    fn log_settled(&self, report: &SettlementReport) {
        for m in &report.settled {
            self.audit.log_quiet(&MatchSettledEvent {
                ts: now_iso(),
                event: "MATCH_SETTLED",
                match_id: m.match_id,
                fixture: m.fixture.clone(),
                home_goals: m.home_goals,
                away_goals: m.away_goals,
                outcome: m.outcome.to_string(),
                bets_won: m.bets_won,
                bets_lost: m.bets_lost,
                paid_out: m.paid_out.to_string(),
            });
        }
    }
}
