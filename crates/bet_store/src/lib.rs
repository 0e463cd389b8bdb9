//! betfeed — Bet Store
//!
//! SQLite persistence for sports, tournaments, matches, users, bets and the
//! notification outbox. Every settlement write goes through a single
//! `BEGIN IMMEDIATE` transaction so a concurrently running betting front-end
//! never observes a credited balance without its bet flagged (or vice versa).

mod error;
mod models;
mod schema;
mod store;

pub use error::{Result, StoreError};
pub use models::{
    BetId, BetRecord, BetSettlement, MatchId, MatchRecord, NewBet, NewMatch, OutboxMessage,
    Outcome, SportId, TableCounts, TournamentId, UserId, UserRecord, KICKOFF_FORMAT,
    MAX_DELIVERY_ATTEMPTS,
};
pub use store::BetStore;
