use rusqlite::Connection;

use crate::error::Result;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS tournaments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            sport_id INTEGER NOT NULL REFERENCES sports(id),
            UNIQUE (name, sport_id)
        );

        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tournament_id INTEGER NOT NULL REFERENCES tournaments(id),
            date TEXT NOT NULL,
            player1 TEXT NOT NULL,
            player2 TEXT NOT NULL,
            win1 TEXT NOT NULL,
            draw TEXT NOT NULL,
            win2 TEXT NOT NULL,
            settled INTEGER NOT NULL DEFAULT 0,
            CHECK (player1 <> player2),
            UNIQUE (tournament_id, date, player1, player2)
        );

        CREATE INDEX IF NOT EXISTS idx_matches_lookup ON matches(player1, player2, date, settled);

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL UNIQUE,
            balance TEXT NOT NULL DEFAULT '0'
        );

        CREATE TABLE IF NOT EXISTS bets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(id),
            user_id INTEGER NOT NULL REFERENCES users(id),
            outcome TEXT NOT NULL CHECK (outcome IN ('WIN1', 'WIN2', 'DRAW')),
            amount TEXT NOT NULL,
            coeff TEXT NOT NULL,
            settled INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_bets_match ON bets(match_id, settled);

        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            delivered_at TEXT,
            failed_at TEXT,
            last_error TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_pending ON notifications(delivered_at, failed_at, id);
        "#,
    )?;

    Ok(())
}
