/// betfeed — Notify Relay
///
/// Drains the `notifications` outbox filled by the feed worker and delivers
/// each message through the Telegram Bot API. At-least-once: a message is
/// marked delivered only after Telegram accepted it. A message Telegram
/// refuses for good (blocked bot, unknown chat), or one that keeps failing,
/// is marked failed and leaves the queue.
///
/// Run:
///   TELEGRAM_BOT_TOKEN=... cargo run --bin notify-relay

use anyhow::{Context, Result};
use bet_store::{BetStore, OutboxMessage, MAX_DELIVERY_ATTEMPTS};
use dotenv::dotenv;
use std::collections::HashSet;
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const BATCH_SIZE: usize = 50;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set")?;
    let db_path = env::var("BETFEED_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/betfeed.db"));
    let poll_interval_secs = env::var("NOTIFY_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);

    let store = BetStore::open(&db_path)
        .with_context(|| format!("open db at {}", db_path.display()))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    info!("=== betfeed notify relay ===");
    info!("DB: {}  poll: {}s", db_path.display(), poll_interval_secs);

    loop {
        match store.pending_notifications(BATCH_SIZE) {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                debug!("{} pending notifications", batch.len());
                let outcome = relay_batch(&store, &batch, |chat_id, text| {
                    tg_send_message(&client, &token, chat_id, text)
                })
                .await;
                info!(
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    deferred = outcome.deferred,
                    "relay round"
                );
            }
            Err(e) => warn!("reading outbox failed: {}", e),
        }

        sleep(Duration::from_secs(poll_interval_secs)).await;
    }
}

#[derive(Debug)]
enum SendError {
    /// Telegram will never take this message (4xx other than 429).
    Rejected(String),
    /// Network trouble, rate limit, 5xx.
    Retry(String),
}

#[derive(Debug, Default, PartialEq)]
struct RoundOutcome {
    delivered: usize,
    failed: usize,
    deferred: usize,
}

/// Deliver in id order. A retryable failure holds back the rest of that
/// chat's messages for this round so they never overtake it; other chats
/// keep going.
async fn relay_batch<F, Fut>(store: &BetStore, batch: &[OutboxMessage], mut send: F) -> RoundOutcome
where
    F: FnMut(i64, String) -> Fut,
    Fut: Future<Output = Result<i64, SendError>>,
{
    let mut outcome = RoundOutcome::default();
    let mut held: HashSet<i64> = HashSet::new();

    for msg in batch {
        if held.contains(&msg.chat_id) {
            outcome.deferred += 1;
            continue;
        }

        if let Err(e) = store.record_attempt(msg.id) {
            warn!(id = msg.id, "recording attempt failed: {}", e);
            held.insert(msg.chat_id);
            outcome.deferred += 1;
            continue;
        }
        let attempts = msg.attempts + 1;

        let reason = match send(msg.chat_id, msg.body.clone()).await {
            Ok(message_id) => {
                match store.mark_delivered(msg.id) {
                    Ok(_) => {
                        info!(id = msg.id, chat_id = msg.chat_id, message_id, "delivered");
                        outcome.delivered += 1;
                    }
                    Err(e) => {
                        warn!(id = msg.id, "delivered but not marked, will resend: {}", e);
                        held.insert(msg.chat_id);
                        outcome.deferred += 1;
                    }
                }
                continue;
            }
            Err(SendError::Rejected(reason)) => reason,
            Err(SendError::Retry(reason)) if attempts >= MAX_DELIVERY_ATTEMPTS => {
                format!("gave up after {attempts} attempts: {reason}")
            }
            Err(SendError::Retry(reason)) => {
                warn!(id = msg.id, chat_id = msg.chat_id, attempts, "send failed, will retry: {}", reason);
                held.insert(msg.chat_id);
                outcome.deferred += 1;
                continue;
            }
        };

        warn!(id = msg.id, chat_id = msg.chat_id, attempts, "dropping message: {}", reason);
        match store.mark_failed(msg.id, &reason) {
            Ok(_) => outcome.failed += 1,
            Err(e) => {
                warn!(id = msg.id, "marking failed message failed: {}", e);
                held.insert(msg.chat_id);
                outcome.deferred += 1;
            }
        }
    }

    outcome
}

async fn tg_send_message(client: &reqwest::Client, token: &str, chat_id: i64, text: String) -> Result<i64, SendError> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
    let body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "disable_web_page_preview": true,
    });
    let resp = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| SendError::Retry(e.without_url().to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let reason = format!("Telegram sendMessage failed: {} {}", status, body);
        return Err(if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            SendError::Rejected(reason)
        } else {
            SendError::Retry(reason)
        });
    }

    // Accepted; an unreadable body must not cause a resend.
    let resp_json: serde_json::Value = resp.json().await.unwrap_or_default();
    Ok(resp_json["result"]["message_id"].as_i64().unwrap_or(0))
}
