//! Full passes against a scripted feed and an in-memory store.

use async_trait::async_trait;
use bet_store::{BetStore, NewBet, Outcome};
use feed_client::{odds_url, tournament_url, FeedSource, FetchError, TournamentPage};
use feed_codec::{parse_odds, RawOdds};
use logger::EventLogger;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use settlement::{SportFeed, SportsCatalog, Worker};
use std::collections::HashMap;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const BASE: &str = "http://feed.test";
const EPL: &str = "/england/premier-league/";
const LIGUE1: &str = "/france/ligue-1/";

const EPL_FIXTURES: &str = "SA÷1¬~ZA÷ENGLAND: Premier League¬ZEE÷dYlOSQOD¬~\
    AA÷ev1¬AE÷Arsenal¬AF÷Chelsea¬AD÷1700000000¬~";

fn epl_result(home_goals: u32, away_goals: u32) -> String {
    format!(
        "SA÷1¬~ZA÷ENGLAND: Premier League¬~\
         AA÷ev1¬AE÷Arsenal¬AF÷Chelsea¬AD÷1700000000¬AG÷{home_goals}¬AH÷{away_goals}¬AS÷1¬~"
    )
}

// ── Scripted feed ───────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedFeed {
    pages: Mutex<HashMap<String, TournamentPage>>,
    odds: Mutex<HashMap<String, Option<RawOdds>>>,
    odds_calls: AtomicUsize,
}

impl ScriptedFeed {
    fn set_page(&self, path: &str, fixtures: Option<&str>, results: Option<&str>) {
        self.pages.lock().unwrap().insert(
            path.to_string(),
            TournamentPage {
                fixtures: fixtures.map(str::to_string),
                results: results.map(str::to_string),
            },
        );
    }

    fn set_odds(&self, event_id: &str, body: &str) {
        self.odds.lock().unwrap().insert(event_id.to_string(), parse_odds(body));
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn tournament_page(&self, base_url: &str, path: &str) -> Result<TournamentPage, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::Status { url: tournament_url(base_url, path), status: 503 })
    }

    async fn event_odds(&self, base_url: &str, event_id: &str) -> Result<Option<RawOdds>, FetchError> {
        self.odds_calls.fetch_add(1, Ordering::SeqCst);
        self.odds
            .lock()
            .unwrap()
            .get(event_id)
            .cloned()
            .ok_or_else(|| FetchError::Status { url: odds_url(base_url, event_id), status: 500 })
    }
}

/// Worker plus its audit directory, removed again on drop.
struct TestWorker {
    worker: Worker<ScriptedFeed>,
    log_dir: PathBuf,
}

impl TestWorker {
    fn audit_events(&self, kind: &str) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        for entry in fs::read_dir(&self.log_dir).unwrap() {
            let raw = fs::read_to_string(entry.unwrap().path()).unwrap();
            for line in raw.lines() {
                let event: serde_json::Value = serde_json::from_str(line).unwrap();
                if event["event"] == kind {
                    events.push(event);
                }
            }
        }
        events
    }
}

impl Deref for TestWorker {
    type Target = Worker<ScriptedFeed>;

    fn deref(&self) -> &Self::Target {
        &self.worker
    }
}

impl DerefMut for TestWorker {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.worker
    }
}

impl Drop for TestWorker {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.log_dir).ok();
    }
}

fn worker(test: &str, paths: &[&str]) -> TestWorker {
    let catalog = SportsCatalog {
        sports: vec![SportFeed {
            name: "soccer".into(),
            base_url: BASE.into(),
            tournaments: paths.iter().map(|p| p.to_string()).collect(),
        }],
    };
    let log_dir = std::env::temp_dir().join(format!("betfeed-it-{test}-{}", std::process::id()));

    let worker = Worker::new(
        BetStore::open_in_memory().unwrap(),
        ScriptedFeed::default(),
        catalog,
        2,
        EventLogger::new(log_dir.clone()),
    );

    TestWorker { worker, log_dir }
}

/// Ingest the Arsenal - Chelsea fixture and place one bet on it.
async fn worker_with_bet(test: &str, pick: Outcome) -> (TestWorker, i64, i64) {
    let mut w = worker(test, &[EPL]);
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");

    let report = w.run_pass().await.unwrap();
    assert_eq!(report.ingest.inserted, 1);

    let store = w.store_mut();
    let kickoff = feed_codec::event::parse_kickoff("1700000000").unwrap();
    let m = store.find_open_match("Arsenal", "Chelsea", &kickoff).unwrap().unwrap();
    assert_eq!((m.win1, m.draw, m.win2), (dec!(1.90), dec!(3.40), dec!(4.10)));

    let user = store.create_user(555, dec!(50)).unwrap();
    let bet = store
        .insert_bet(&NewBet {
            match_id: m.id,
            user_id: user,
            outcome: pick,
            amount: dec!(10),
            coeff: m.win1,
        })
        .unwrap();

    (w, user, bet)
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn winning_bet_is_paid_and_notified() {
    let (mut w, user, bet) = worker_with_bet("win", Outcome::Win1).await;
    w.source().set_page(EPL, None, Some(&epl_result(2, 0)));

    let report = w.run_pass().await.unwrap();

    assert_eq!(report.settlement.settled.len(), 1);
    let settled = &report.settlement.settled[0];
    assert_eq!(settled.outcome, Outcome::Win1);
    assert_eq!(settled.bets_won, 1);
    assert_eq!(settled.paid_out, dec!(19.00));

    let store = w.store();
    assert_eq!(store.user(user).unwrap().balance, dec!(69.00));
    assert!(store.bet(bet).unwrap().settled);
    assert!(store.match_by_id(settled.match_id).unwrap().settled);

    let outbox = store.pending_notifications(10).unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].chat_id, 555);
    assert_eq!(
        outbox[0].body,
        "Your bet \"Arsenal - Chelsea\" won! +19.00 Now your balance is 69.00"
    );
}

#[tokio::test]
async fn losing_bet_is_closed_without_credit() {
    let (mut w, user, bet) = worker_with_bet("loss", Outcome::Win1).await;
    w.source().set_page(EPL, None, Some(&epl_result(0, 0)));

    let report = w.run_pass().await.unwrap();

    let settled = &report.settlement.settled[0];
    assert_eq!(settled.outcome, Outcome::Draw);
    assert_eq!((settled.bets_won, settled.bets_lost), (0, 1));

    let store = w.store();
    assert_eq!(store.user(user).unwrap().balance, dec!(50));
    assert!(store.bet(bet).unwrap().settled);
    assert!(store.match_by_id(settled.match_id).unwrap().settled);

    let outbox = store.pending_notifications(10).unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].body, "Unfortunately, your bet \"Arsenal - Chelsea\" lost.");
}

#[tokio::test]
async fn repeated_results_never_pay_twice() {
    let (mut w, user, _) = worker_with_bet("twice", Outcome::Win1).await;
    w.source().set_page(EPL, None, Some(&epl_result(3, 1)));

    w.run_pass().await.unwrap();
    let second = w.run_pass().await.unwrap();

    assert!(second.settlement.settled.is_empty());
    assert_eq!(second.settlement.unmatched, 1);
    assert_eq!(w.store().user(user).unwrap().balance, dec!(69.00));
    assert_eq!(w.store().pending_notifications(10).unwrap().len(), 1);
}

#[tokio::test]
async fn half_settled_match_is_finished_on_next_pass() {
    let (mut w, user, first_bet) = worker_with_bet("resume", Outcome::Win1).await;

    // Second bettor on the same match.
    let store = w.store_mut();
    let m = store.bet(first_bet).unwrap().match_id;
    let other = store.create_user(777, dec!(0)).unwrap();
    let second_bet = store
        .insert_bet(&NewBet {
            match_id: m,
            user_id: other,
            outcome: Outcome::Win2,
            amount: dec!(4),
            coeff: dec!(4.10),
        })
        .unwrap();

    // A previous run got through the first bet and died before closing the match.
    let bet = store.bet(first_bet).unwrap();
    store
        .settle_bet(&bet, Some(bet.payout().unwrap()), |_| "paid earlier".into())
        .unwrap();

    w.source().set_page(EPL, None, Some(&epl_result(1, 0)));
    let report = w.run_pass().await.unwrap();

    let settled = &report.settlement.settled[0];
    assert_eq!((settled.bets_won, settled.bets_lost), (0, 1));

    let store = w.store();
    assert_eq!(store.user(user).unwrap().balance, dec!(69.00));
    assert_eq!(store.user(other).unwrap().balance, dec!(0));
    assert!(store.bet(second_bet).unwrap().settled);
    assert!(store.match_by_id(m).unwrap().settled);

    let bodies: Vec<String> = store
        .pending_notifications(10)
        .unwrap()
        .into_iter()
        .map(|n| n.body)
        .collect();
    assert_eq!(
        bodies,
        vec![
            "paid earlier".to_string(),
            "Unfortunately, your bet \"Arsenal - Chelsea\" lost.".to_string(),
        ]
    );
}

#[tokio::test]
async fn same_fixture_is_ingested_once() {
    let mut w = worker("dedup", &[EPL]);
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");

    let first = w.run_pass().await.unwrap();
    let second = w.run_pass().await.unwrap();

    assert_eq!((first.ingest.inserted, first.ingest.duplicates), (1, 0));
    assert_eq!((second.ingest.inserted, second.ingest.duplicates), (0, 1));

    let counts = w.store().table_counts().unwrap();
    assert_eq!(counts.matches, 1);
    assert_eq!(counts.tournaments, 1);
    assert_eq!(counts.sports, 1);
}

#[tokio::test]
async fn fixtures_without_usable_odds_are_dropped() {
    let mut w = worker("odds", &[EPL]);
    let fixtures = "SA÷1¬~ZA÷ENGLAND: Premier League¬~\
        AA÷ok¬AE÷Arsenal¬AF÷Chelsea¬AD÷1700000000¬~\
        AA÷void¬AE÷Everton¬AF÷Fulham¬AD÷1700000000¬~\
        AA÷nomi¬AE÷Burnley¬AF÷Luton¬AD÷1700000000¬~\
        AA÷down¬AE÷Brentford¬AF÷Wolves¬AD÷1700000000¬~";
    w.source().set_page(EPL, Some(fixtures), None);
    w.source().set_odds("ok", "MI÷2.10|3.30|3.60");
    w.source().set_odds("void", "MI÷-|-|-");
    w.source().set_odds("nomi", "OA÷1¬");
    // "down" has no scripted odds → lookup error

    let report = w.run_pass().await.unwrap();

    assert_eq!(w.source().odds_calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.ingest.inserted, 1);
    assert_eq!(report.odds_rejected, 1);
    assert_eq!(report.odds_missing, 1);
    assert_eq!(report.odds_failed, 1);
    assert_eq!(w.store().table_counts().unwrap().matches, 1);
}

#[tokio::test]
async fn failed_tournament_does_not_stop_the_pass() {
    let mut w = worker("partial", &[LIGUE1, EPL]);
    // LIGUE1 has no scripted page → HTTP 503
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");

    let report = w.run_pass().await.unwrap();

    assert_eq!(report.tournaments_failed, 1);
    assert_eq!(report.tournaments_ok, 1);
    assert_eq!(report.ingest.inserted, 1);
}

#[tokio::test]
async fn results_for_unknown_fixtures_are_ignored() {
    let mut w = worker("unknown", &[EPL]);
    w.source().set_page(EPL, None, Some(&epl_result(1, 2)));

    let report = w.run_pass().await.unwrap();

    assert_eq!(report.settlement.unmatched, 1);
    assert_eq!(report.total_errors(), 0);
    assert!(report.settlement.settled.is_empty());
}

#[tokio::test]
async fn match_without_bets_is_still_closed() {
    let mut w = worker("nobets", &[EPL]);
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");
    w.run_pass().await.unwrap();

    w.source().set_page(EPL, None, Some(&epl_result(0, 1)));
    let report = w.run_pass().await.unwrap();

    let settled = &report.settlement.settled[0];
    assert_eq!(settled.outcome, Outcome::Win2);
    assert_eq!(report.settlement.bets_settled(), 0);
    assert_eq!(w.store().table_counts().unwrap().open_matches, 0);
}

#[tokio::test]
async fn unwritable_store_aborts_the_pass() {
    let mut w = worker("fatal", &[EPL]);
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");
    w.store().set_query_only(true).unwrap();

    let err = w.run_pass().await.unwrap_err();
    assert!(err.is_fatal(), "{err:?}");

    let summaries = w.audit_events("PASS_SUMMARY");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["aborted"], true);

    // Store comes back, next interval runs normally.
    w.store().set_query_only(false).unwrap();
    let report = w.run_pass().await.unwrap();
    assert_eq!(report.ingest.inserted, 1);
    assert_eq!(w.audit_events("PASS_SUMMARY")[1]["aborted"], false);
}

#[tokio::test]
async fn pass_writes_feed_status_for_every_tournament() {
    let mut w = worker("audit", &[LIGUE1, EPL]);
    w.source().set_page(EPL, Some(EPL_FIXTURES), None);
    w.source().set_odds("ev1", "MI÷1.90|3.40|4.10");

    w.run_pass().await.unwrap();

    let statuses = w.audit_events("FEED_STATUS");
    let oks: Vec<(String, bool)> = statuses
        .iter()
        .map(|s| (s["tournament"].as_str().unwrap().to_string(), s["ok"].as_bool().unwrap()))
        .collect();
    assert_eq!(oks, vec![(LIGUE1.to_string(), false), (EPL.to_string(), true)]);
}
