//! betfeed — Feed Client
//!
//! HTTP side of the livescore feed:
//! - tournament page (HTML) → embedded fixtures / results feed blobs
//! - per-event odds document (`/x/feed/df_dos_2_<event_id>_`, signed with `X-Fsign`)
//!
//! `FeedSource` is the seam the settlement worker talks to; `FeedClient` is
//! the reqwest implementation.

use async_trait::async_trait;
use feed_codec::{parse_odds, RawOdds};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use scraper::{Html, Selector};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const FIXTURES_ELEMENT_ID: &str = "tournament-page-data-summary-fixtures";
pub const RESULTS_ELEMENT_ID: &str = "tournament-page-data-summary-results";
pub const DEFAULT_FEED_SIGN: &str = "SW9D1eZo";
pub const FEED_SIGN_HEADER: &str = "X-Fsign";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("http error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Http { url: url.to_string(), source }
        }
    }
}

/// Feed blobs embedded in a tournament page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentPage {
    pub fixtures: Option<String>,
    pub results: Option<String>,
}

impl TournamentPage {
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        Self {
            fixtures: element_text(&document, FIXTURES_ELEMENT_ID),
            results: element_text(&document, RESULTS_ELEMENT_ID),
        }
    }
}

fn element_text(document: &Html, id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("#{id}")).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn tournament_page(&self, base_url: &str, path: &str) -> Result<TournamentPage, FetchError>;

    /// `Ok(None)` when the odds document carries no usable `MI` triple.
    async fn event_odds(&self, base_url: &str, event_id: &str) -> Result<Option<RawOdds>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub feed_sign: String,
    pub timeout: Duration,
    pub requests_per_sec: u32,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            feed_sign: DEFAULT_FEED_SIGN.to_string(),
            timeout: Duration::from_secs(15),
            requests_per_sec: 5,
        }
    }
}

pub struct FeedClient {
    client: reqwest::Client,
    feed_sign: String,
    limiter: DefaultDirectRateLimiter,
}

impl FeedClient {
    pub fn new(cfg: FeedClientConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| FetchError::from_reqwest("<client>", e))?;

        let rate = NonZeroU32::new(cfg.requests_per_sec).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            feed_sign: cfg.feed_sign,
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    async fn get_text(&self, url: &str, signed: bool) -> Result<String, FetchError> {
        self.limiter.until_ready().await;

        let mut req = self.client.get(url);
        if signed {
            req = req.header(FEED_SIGN_HEADER, &self.feed_sign);
        }

        let resp = req.send().await.map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        resp.text().await.map_err(|e| FetchError::from_reqwest(url, e))
    }
}

pub fn tournament_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn odds_url(base_url: &str, event_id: &str) -> String {
    format!("{}/x/feed/df_dos_2_{}_", base_url.trim_end_matches('/'), event_id)
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn tournament_page(&self, base_url: &str, path: &str) -> Result<TournamentPage, FetchError> {
        let url = tournament_url(base_url, path);
        let html = self.get_text(&url, false).await?;
        let page = TournamentPage::from_html(&html);
        debug!(
            url = %url,
            fixtures = page.fixtures.is_some(),
            results = page.results.is_some(),
            "tournament page fetched"
        );
        Ok(page)
    }

    async fn event_odds(&self, base_url: &str, event_id: &str) -> Result<Option<RawOdds>, FetchError> {
        let url = odds_url(base_url, event_id);
        let body = self.get_text(&url, true).await?;
        Ok(parse_odds(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_both_feed_blobs() {
        let html = r#"
            <html><body>
              <div id="tournament-page-data-summary-fixtures" style="display:none">SA÷1¬~ZA÷Ligue 1¬~AA÷a¬AE÷Lyon¬~</div>
              <div id="tournament-page-data-summary-results" style="display:none">SA÷1¬~AA÷b¬AG÷1¬AH÷0¬~</div>
            </body></html>
        "#;

        assert_eq!(
            TournamentPage::from_html(html),
            TournamentPage {
                fixtures: Some("SA÷1¬~ZA÷Ligue 1¬~AA÷a¬AE÷Lyon¬~".into()),
                results: Some("SA÷1¬~AA÷b¬AG÷1¬AH÷0¬~".into()),
            }
        );
    }

    #[test]
    fn missing_or_empty_sections_are_none() {
        let html = r#"<div id="tournament-page-data-summary-fixtures">   </div>"#;
        assert_eq!(TournamentPage::from_html(html), TournamentPage::default());
    }

    #[test]
    fn urls_are_joined_without_double_slash() {
        assert_eq!(
            tournament_url("http://www.soccer24.com/", "/france/ligue-1/"),
            "http://www.soccer24.com/france/ligue-1/"
        );
        assert_eq!(
            odds_url("http://www.soccer24.com", "Qk1xYz"),
            "http://www.soccer24.com/x/feed/df_dos_2_Qk1xYz_"
        );
    }

    #[test]
    fn client_builds_with_zero_rate() {
        let cfg = FeedClientConfig { requests_per_sec: 0, ..Default::default() };
        assert!(FeedClient::new(cfg).is_ok());
    }
}
