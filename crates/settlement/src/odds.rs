//! Odds stage: upcoming events → events with a usable three-way price.
//!
//! Lookups are independent per event and run with bounded concurrency;
//! the whole batch is joined before ingestion sees any of it.

use feed_client::FeedSource;
use feed_codec::{DecodedEvent, OddsError, ThreeWayOdds};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PricedFixture {
    pub event: DecodedEvent,
    pub odds: ThreeWayOdds,
}

#[derive(Debug, Default)]
pub struct OddsStage {
    pub priced: Vec<PricedFixture>,
    /// No `MI` triple in the odds document.
    pub missing: usize,
    /// Suspended / void market, or prices that are not decimals.
    pub rejected: usize,
    /// Network failures.
    pub failed: usize,
}

pub async fn resolve_fixture_odds<S>(
    source: &S,
    base_url: &str,
    events: Vec<DecodedEvent>,
    concurrency: usize,
) -> OddsStage
where
    S: FeedSource + ?Sized,
{
    let lookups: Vec<_> = stream::iter(events)
        .map(|event| async move {
            let result = source.event_odds(base_url, &event.event_id).await;
            (event, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut stage = OddsStage::default();

    for (mut event, result) in lookups {
        let raw = match result {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(event_id = %event.event_id, "no odds published");
                stage.missing += 1;
                continue;
            }
            Err(e) => {
                warn!(event_id = %event.event_id, "odds lookup failed: {}", e);
                stage.failed += 1;
                continue;
            }
        };

        match raw.to_decimal() {
            Ok(odds) => {
                event.odds = Some(raw);
                stage.priced.push(PricedFixture { event, odds });
            }
            Err(OddsError::VoidMarket) => {
                debug!(event_id = %event.event_id, "void market, dropping");
                stage.rejected += 1;
            }
            Err(e) => {
                warn!(event_id = %event.event_id, "{}", e);
                stage.rejected += 1;
            }
        }
    }

    stage
}
