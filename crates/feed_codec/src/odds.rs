//! Secondary odds document decoder.
//!
//! Body uses the same cell / key-value scheme as the main feed. Only `MI`
//! matters: `MI÷<win1>|<draw>|<win2>`.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::wire::{cells_to_group, CELL_SEP};

pub const ODDS_KEY: &str = "MI";
pub const ODDS_SEP: char = '|';
/// Suspended / void market marker inside a price.
pub const VOID_MARKET: char = '-';

/// Three-way prices exactly as sent by the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOdds {
    pub win1: String,
    pub draw: String,
    pub win2: String,
}

/// Three-way decimal prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreeWayOdds {
    pub win1: Decimal,
    pub draw: Decimal,
    pub win2: Decimal,
}

#[derive(Error, Debug, PartialEq)]
pub enum OddsError {
    #[error("market is void or suspended")]
    VoidMarket,

    #[error("invalid {leg} price {raw:?}")]
    InvalidPrice { leg: &'static str, raw: String },
}

impl RawOdds {
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (&self.win1, &self.draw, &self.win2)
    }

    pub fn is_void(&self) -> bool {
        [&self.win1, &self.draw, &self.win2]
            .iter()
            .any(|price| price.contains(VOID_MARKET))
    }

    pub fn to_decimal(&self) -> Result<ThreeWayOdds, OddsError> {
        if self.is_void() {
            return Err(OddsError::VoidMarket);
        }
        Ok(ThreeWayOdds {
            win1: price("win1", &self.win1)?,
            draw: price("draw", &self.draw)?,
            win2: price("win2", &self.win2)?,
        })
    }
}

fn price(leg: &'static str, raw: &str) -> Result<Decimal, OddsError> {
    Decimal::from_str(raw.trim()).map_err(|_| OddsError::InvalidPrice {
        leg,
        raw: raw.to_string(),
    })
}

/// Decode an odds document. `None` when `MI` is absent or not a triple.
pub fn parse_odds(content: &str) -> Option<RawOdds> {
    let group = cells_to_group(content.split(CELL_SEP));
    let value = group.get(ODDS_KEY)?;

    let parts: Vec<&str> = value.split(ODDS_SEP).collect();
    match parts.as_slice() {
        [win1, draw, win2] => Some(RawOdds {
            win1: win1.to_string(),
            draw: draw.to_string(),
            win2: win2.to_string(),
        }),
        _ => None,
    }
}
