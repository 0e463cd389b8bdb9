use chrono::{NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::*;
use crate::schema::init_schema;

const MATCH_COLUMNS: &str = "id, tournament_id, date, player1, player2, win1, draw, win2, settled";

/// Handle over one SQLite connection. Constructed by the binary and passed
/// into the worker; there is no process-wide connection.
pub struct BetStore {
    conn: Connection,
}

impl BetStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    // ── Sports / tournaments ────────────────────────────────────────────────

    pub fn ensure_sport(&self, name: &str) -> Result<SportId> {
        self.conn.execute(
            "INSERT INTO sports(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM sports WHERE name = ?1", params![name], |r| r.get(0))?;
        Ok(id)
    }

    pub fn ensure_tournament(&self, sport_id: SportId, name: &str) -> Result<TournamentId> {
        self.conn.execute(
            "INSERT INTO tournaments(name, sport_id) VALUES (?1, ?2) ON CONFLICT(name, sport_id) DO NOTHING",
            params![name, sport_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM tournaments WHERE name = ?1 AND sport_id = ?2",
            params![name, sport_id],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    // ── Matches ─────────────────────────────────────────────────────────────

    /// Insert a fixture. An existing (tournament, date, player1, player2) row
    /// yields `StoreError::Duplicate`; any failure rolls the row back.
    pub fn insert_match(&mut self, m: &NewMatch) -> Result<MatchId> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO matches(tournament_id, date, player1, player2, win1, draw, win2)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                m.tournament_id,
                format_kickoff(&m.date),
                m.player1,
                m.player2,
                m.win1.to_string(),
                m.draw.to_string(),
                m.win2.to_string(),
            ],
        )
        .map_err(|e| StoreError::from_insert("match", e))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn find_open_match(
        &self,
        player1: &str,
        player2: &str,
        date: &NaiveDateTime,
    ) -> Result<Option<MatchRecord>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE player1 = ?1 AND player2 = ?2 AND date = ?3 AND settled = 0 \
             ORDER BY id LIMIT 1"
        );
        let found = self
            .conn
            .query_row(&sql, params![player1, player2, format_kickoff(date)], match_from_row)
            .optional()?;
        Ok(found)
    }

    pub fn match_by_id(&self, id: MatchId) -> Result<MatchRecord> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], match_from_row)
            .optional()?
            .ok_or(StoreError::NotFound { entity: "match", id })
    }

    /// Flip the match to settled. `false` when it was already settled.
    pub fn close_match(&self, id: MatchId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE matches SET settled = 1 WHERE id = ?1 AND settled = 0",
            params![id],
        )?;
        Ok(changed == 1)
    }

    // ── Users / bets ────────────────────────────────────────────────────────

    pub fn create_user(&self, chat_id: i64, balance: Decimal) -> Result<UserId> {
        self.conn
            .execute(
                "INSERT INTO users(chat_id, balance) VALUES (?1, ?2)",
                params![chat_id, balance.to_string()],
            )
            .map_err(|e| StoreError::from_insert("user", e))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn user(&self, id: UserId) -> Result<UserRecord> {
        self.conn
            .query_row(
                "SELECT id, chat_id, balance FROM users WHERE id = ?1",
                params![id],
                |r| {
                    Ok(UserRecord {
                        id: r.get(0)?,
                        chat_id: r.get(1)?,
                        balance: decimal_at(r, 2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    /// Plain insert used by the betting front-end; no validation here.
    pub fn insert_bet(&self, bet: &NewBet) -> Result<BetId> {
        self.conn.execute(
            "INSERT INTO bets(match_id, user_id, outcome, amount, coeff) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bet.match_id,
                bet.user_id,
                bet.outcome,
                bet.amount.to_string(),
                bet.coeff.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn bet(&self, id: BetId) -> Result<BetRecord> {
        self.conn
            .query_row(
                r#"
                SELECT b.id, b.match_id, b.user_id, u.chat_id, b.outcome, b.amount, b.coeff, b.settled
                FROM bets b JOIN users u ON u.id = b.user_id
                WHERE b.id = ?1
                "#,
                params![id],
                bet_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound { entity: "bet", id })
    }

    pub fn open_bets(&self, match_id: MatchId) -> Result<Vec<BetRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT b.id, b.match_id, b.user_id, u.chat_id, b.outcome, b.amount, b.coeff, b.settled
            FROM bets b JOIN users u ON u.id = b.user_id
            WHERE b.match_id = ?1 AND b.settled = 0
            ORDER BY b.id
            "#,
        )?;
        let bets = stmt
            .query_map(params![match_id], bet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bets)
    }

    /// Settle one bet as a single unit: flip its flag, credit the owner when
    /// `credit` is set, queue the notification rendered by `render`.
    ///
    /// Returns `None` without touching anything if the bet was already
    /// settled, so a re-scan can never pay or notify twice.
    pub fn settle_bet<F>(
        &mut self,
        bet: &BetRecord,
        credit: Option<Decimal>,
        render: F,
    ) -> Result<Option<BetSettlement>>
    where
        F: FnOnce(&BetSettlement) -> String,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let flipped = tx.execute(
            "UPDATE bets SET settled = 1 WHERE id = ?1 AND settled = 0",
            params![bet.id],
        )?;
        if flipped == 0 {
            debug!(bet_id = bet.id, "bet already settled, skipping");
            return Ok(None);
        }

        let (chat_id, mut balance) = tx
            .query_row(
                "SELECT chat_id, balance FROM users WHERE id = ?1",
                params![bet.user_id],
                |r| Ok((r.get::<_, i64>(0)?, decimal_at(r, 1)?)),
            )
            .optional()?
            .ok_or(StoreError::NotFound { entity: "user", id: bet.user_id })?;

        if let Some(amount) = credit {
            balance = balance
                .checked_add(amount)
                .ok_or(StoreError::Overflow { bet_id: bet.id })?;
            tx.execute(
                "UPDATE users SET balance = ?1 WHERE id = ?2",
                params![balance.to_string(), bet.user_id],
            )?;
        }

        let settlement = BetSettlement {
            bet_id: bet.id,
            user_id: bet.user_id,
            chat_id,
            credited: credit,
            balance,
        };

        tx.execute(
            "INSERT INTO notifications(chat_id, body, created_at) VALUES (?1, ?2, ?3)",
            params![chat_id, render(&settlement), Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(Some(settlement))
    }

    // ── Notification outbox ─────────────────────────────────────────────────

    pub fn pending_notifications(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_id, body, attempts FROM notifications \
             WHERE delivered_at IS NULL AND failed_at IS NULL ORDER BY id LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok(OutboxMessage {
                    id: r.get(0)?,
                    chat_id: r.get(1)?,
                    body: r.get(2)?,
                    attempts: r.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn record_attempt(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE notifications SET attempts = attempts + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn mark_delivered(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications SET delivered_at = ?1 \
             WHERE id = ?2 AND delivered_at IS NULL AND failed_at IS NULL",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed == 1)
    }

    /// Stop retrying a message. `false` when it was already delivered or failed.
    pub fn mark_failed(&self, id: i64, reason: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications SET failed_at = ?1, last_error = ?2 \
             WHERE id = ?3 AND delivered_at IS NULL AND failed_at IS NULL",
            params![Utc::now().to_rfc3339(), reason, id],
        )?;
        Ok(changed == 1)
    }

    // ── Stats ───────────────────────────────────────────────────────────────

    /// Reject every write on this connection from now on (`PRAGMA query_only`).
    pub fn set_query_only(&self, on: bool) -> Result<()> {
        self.conn.pragma_update(None, "query_only", on)?;
        Ok(())
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };

        Ok(TableCounts {
            sports: count("SELECT COUNT(1) FROM sports")?,
            tournaments: count("SELECT COUNT(1) FROM tournaments")?,
            matches: count("SELECT COUNT(1) FROM matches")?,
            open_matches: count("SELECT COUNT(1) FROM matches WHERE settled = 0")?,
            users: count("SELECT COUNT(1) FROM users")?,
            bets: count("SELECT COUNT(1) FROM bets")?,
            open_bets: count("SELECT COUNT(1) FROM bets WHERE settled = 0")?,
            pending_notifications: count(
                "SELECT COUNT(1) FROM notifications WHERE delivered_at IS NULL AND failed_at IS NULL",
            )?,
            failed_notifications: count("SELECT COUNT(1) FROM notifications WHERE failed_at IS NOT NULL")?,
        })
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

impl ToSql for Outcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Outcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Outcome::from_str(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub(crate) fn format_kickoff(date: &NaiveDateTime) -> String {
    date.format(KICKOFF_FORMAT).to_string()
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn kickoff_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, KICKOFF_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn match_from_row(r: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: r.get(0)?,
        tournament_id: r.get(1)?,
        date: kickoff_at(r, 2)?,
        player1: r.get(3)?,
        player2: r.get(4)?,
        win1: decimal_at(r, 5)?,
        draw: decimal_at(r, 6)?,
        win2: decimal_at(r, 7)?,
        settled: r.get(8)?,
    })
}

fn bet_from_row(r: &Row<'_>) -> rusqlite::Result<BetRecord> {
    Ok(BetRecord {
        id: r.get(0)?,
        match_id: r.get(1)?,
        user_id: r.get(2)?,
        chat_id: r.get(3)?,
        outcome: r.get(4)?,
        amount: decimal_at(r, 5)?,
        coeff: decimal_at(r, 6)?,
        settled: r.get(7)?,
    })
}
