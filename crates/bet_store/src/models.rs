use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

pub type SportId = i64;
pub type TournamentId = i64;
pub type MatchId = i64;
pub type UserId = i64;
pub type BetId = i64;

/// Kickoff column format (UTC).
pub const KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Three-way market outcome. Both a bet's pick and a match's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win1,
    Win2,
    Draw,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win1 => "WIN1",
            Outcome::Win2 => "WIN2",
            Outcome::Draw => "DRAW",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN1" => Ok(Outcome::Win1),
            "WIN2" => Ok(Outcome::Win2),
            "DRAW" => Ok(Outcome::Draw),
            other => Err(StoreError::CorruptValue {
                column: "outcome",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub tournament_id: TournamentId,
    pub date: NaiveDateTime,
    pub player1: String,
    pub player2: String,
    pub win1: Decimal,
    pub draw: Decimal,
    pub win2: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub date: NaiveDateTime,
    pub player1: String,
    pub player2: String,
    pub win1: Decimal,
    pub draw: Decimal,
    pub win2: Decimal,
    pub settled: bool,
}

impl MatchRecord {
    /// `"player1 - player2"`, as shown to bettors.
    pub fn fixture_label(&self) -> String {
        format!("{} - {}", self.player1, self.player2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub chat_id: i64,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBet {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub outcome: Outcome,
    pub amount: Decimal,
    pub coeff: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetRecord {
    pub id: BetId,
    pub match_id: MatchId,
    pub user_id: UserId,
    pub chat_id: i64,
    pub outcome: Outcome,
    pub amount: Decimal,
    pub coeff: Decimal,
    pub settled: bool,
}

impl BetRecord {
    /// Stake times price. Stakes are stored unvalidated, so this can overflow.
    pub fn payout(&self) -> Result<Decimal, StoreError> {
        self.coeff
            .checked_mul(self.amount)
            .ok_or(StoreError::Overflow { bet_id: self.id })
    }
}

/// What a committed bet settlement did to the owner's account.
#[derive(Debug, Clone, PartialEq)]
pub struct BetSettlement {
    pub bet_id: BetId,
    pub user_id: UserId,
    pub chat_id: i64,
    /// `Some` for a winning bet.
    pub credited: Option<Decimal>,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: i64,
    pub chat_id: i64,
    pub body: String,
    pub attempts: i64,
}

/// Give up on an outbox message after this many delivery attempts.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCounts {
    pub sports: i64,
    pub tournaments: i64,
    pub matches: i64,
    pub open_matches: i64,
    pub users: i64,
    pub bets: i64,
    pub open_bets: i64,
    pub pending_notifications: i64,
    pub failed_notifications: i64,
}
