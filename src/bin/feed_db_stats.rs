use anyhow::{Context, Result};
use bet_store::BetStore;

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let db_path = std::env::var("BETFEED_DB_PATH").unwrap_or_else(|_| "data/betfeed.db".to_string());
    let store = BetStore::open(&db_path).with_context(|| format!("open db at {db_path}"))?;
    store.set_query_only(true)?;
    let counts = store.table_counts().context("count rows")?;

    println!("db_path={db_path}");
    println!("sports: {}", counts.sports);
    println!("tournaments: {}", counts.tournaments);
    println!("matches: {} (open {})", counts.matches, counts.open_matches);
    println!("users: {}", counts.users);
    println!("bets: {} (open {})", counts.bets, counts.open_bets);
    println!("notifications pending: {}", counts.pending_notifications);
    println!("notifications failed: {}", counts.failed_notifications);

    Ok(())
}
