//! Settlement engine: finished games → paid / closed bets → closed matches.
//!
//! Result comes only from the goal counts; the feed's own winner code is
//! ignored. Every bet is settled in its own store transaction (flag + credit +
//! outbox message), and the match is closed only once all of its bets went
//! through, so a crash in between leaves an open match whose remaining bets
//! are picked up on the next pass.

use bet_store::{BetStore, MatchRecord, Outcome, StoreError};
use feed_codec::DecodedEvent;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use crate::notifier;

pub fn outcome_from_goals(home_goals: u32, away_goals: u32) -> Outcome {
    match home_goals.cmp(&away_goals) {
        Ordering::Greater => Outcome::Win1,
        Ordering::Less => Outcome::Win2,
        Ordering::Equal => Outcome::Draw,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettledMatch {
    pub match_id: i64,
    pub fixture: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub outcome: Outcome,
    pub bets_won: usize,
    pub bets_lost: usize,
    pub paid_out: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SettlementReport {
    pub settled: Vec<SettledMatch>,
    /// Matches with at least one bet that failed to settle; retried next pass.
    pub left_open: usize,
    /// Results with no open match (never ingested, or already settled).
    pub unmatched: usize,
    /// Results missing score, teams or kickoff.
    pub incomplete: usize,
    /// Bets another run settled first.
    pub bets_already_settled: usize,
    pub errors: usize,
}

impl SettlementReport {
    pub fn bets_settled(&self) -> usize {
        self.settled.iter().map(|m| m.bets_won + m.bets_lost).sum()
    }

    pub fn absorb(&mut self, other: SettlementReport) {
        self.settled.extend(other.settled);
        self.left_open += other.left_open;
        self.unmatched += other.unmatched;
        self.incomplete += other.incomplete;
        self.bets_already_settled += other.bets_already_settled;
        self.errors += other.errors;
    }
}

/// Settle every finished game in `games`. `Err` only when the store is
/// unusable; everything else is logged and counted in the report.
pub fn settle_results(
    store: &mut BetStore,
    games: &[DecodedEvent],
) -> Result<SettlementReport, StoreError> {
    let mut report = SettlementReport::default();

    for game in games {
        let (Some((home_goals, away_goals)), Some(home), Some(away), Some(kickoff)) =
            (game.score(), &game.home, &game.away, game.kickoff)
        else {
            debug!(event_id = %game.event_id, "result without score, teams or kickoff");
            report.incomplete += 1;
            continue;
        };

        let open = match store.find_open_match(home, away, &kickoff) {
            Ok(Some(m)) => m,
            Ok(None) => {
                report.unmatched += 1;
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(event_id = %game.event_id, "match lookup failed: {}", e);
                report.errors += 1;
                continue;
            }
        };

        let outcome = outcome_from_goals(home_goals, away_goals);
        settle_match(store, &open, home_goals, away_goals, outcome, &mut report)?;
    }

    Ok(report)
}

fn settle_match(
    store: &mut BetStore,
    m: &MatchRecord,
    home_goals: u32,
    away_goals: u32,
    outcome: Outcome,
    report: &mut SettlementReport,
) -> Result<(), StoreError> {
    let bets = match store.open_bets(m.id) {
        Ok(bets) => bets,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(match_id = m.id, "loading open bets failed: {}", e);
            report.errors += 1;
            report.left_open += 1;
            return Ok(());
        }
    };

    let fixture = m.fixture_label();
    let mut summary = SettledMatch {
        match_id: m.id,
        fixture: fixture.clone(),
        home_goals,
        away_goals,
        outcome,
        bets_won: 0,
        bets_lost: 0,
        paid_out: Decimal::ZERO,
    };
    let mut complete = true;

    for bet in &bets {
        info!("[{}-{}] comparing bet \"{}\" with real \"{}\"", m.player1, m.player2, bet.outcome, outcome);

        let credit = if bet.outcome == outcome {
            match bet.payout() {
                Ok(amount) => Some(amount),
                Err(e) => {
                    warn!(bet_id = bet.id, match_id = m.id, "cannot pay bet: {}", e);
                    report.errors += 1;
                    complete = false;
                    continue;
                }
            }
        } else {
            None
        };

        match store.settle_bet(bet, credit, |s| notifier::render(&fixture, s)) {
            Ok(Some(settled)) => match settled.credited {
                Some(amount) => {
                    summary.bets_won += 1;
                    summary.paid_out += amount;
                }
                None => summary.bets_lost += 1,
            },
            Ok(None) => report.bets_already_settled += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(bet_id = bet.id, match_id = m.id, "bet settlement failed: {}", e);
                report.errors += 1;
                complete = false;
            }
        }
    }

    if !complete {
        report.left_open += 1;
        return Ok(());
    }

    match store.close_match(m.id) {
        Ok(_) => {
            info!(
                match_id = m.id,
                outcome = %outcome,
                won = summary.bets_won,
                lost = summary.bets_lost,
                "{} {}:{} settled",
                fixture, home_goals, away_goals
            );
            report.settled.push(summary);
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(match_id = m.id, "closing match failed: {}", e);
            report.errors += 1;
            report.left_open += 1;
        }
    }

    Ok(())
}
