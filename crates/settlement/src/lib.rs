//! betfeed — Settlement
//!
//! One pass over the configured sports:
//!   fixtures feed → decode → resolve odds → ingest matches
//!   results feed  → decode → settle open matches → pay winners → queue notifications
//!
//! Storage (`bet_store::BetStore`), network (`feed_client::FeedSource`) and the
//! audit log are all handed to `Worker::new`; nothing here is global.

pub mod config;
pub mod engine;
pub mod ingest;
pub mod notifier;
pub mod odds;
pub mod worker;

pub use config::{SportFeed, SportsCatalog, WorkerConfig};
pub use engine::{outcome_from_goals, settle_results, SettledMatch, SettlementReport};
pub use ingest::{ingest_fixtures, IngestReport};
pub use notifier::Notification;
pub use odds::{resolve_fixture_odds, OddsStage, PricedFixture};
pub use worker::{PassReport, Worker};
