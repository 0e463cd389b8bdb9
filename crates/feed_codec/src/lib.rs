//! betfeed — Feed Codec
//!
//! Pure decoding of the livescore wire format. No network, no storage.
//!
//!   1. `wire`  — row/cell/key-value splitting, tag dispatch (`SA`, `ZA`, `AA`)
//!   2. `event` — cell group → `DecodedEvent` (teams, kickoff, goals)
//!   3. `odds`  — secondary odds document (`MI÷1.90|3.40|4.10`) → `RawOdds`

pub mod event;
pub mod odds;
pub mod wire;

pub use event::{extract_event, extract_events, DecodedEvent};
pub use odds::{parse_odds, OddsError, RawOdds, ThreeWayOdds};
pub use wire::{decode_feed, CellGroup, FeedDocument, RowTag};
