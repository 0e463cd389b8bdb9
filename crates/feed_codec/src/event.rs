//! Event extractor: one cell group → `DecodedEvent`.

use chrono::{DateTime, NaiveDateTime};
use tracing::debug;

use crate::odds::RawOdds;
use crate::wire::{CellGroup, FeedDocument};

/// Field carried by an event cell, keyed by the two-letter feed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    EventId,
    Home,
    Away,
    Kickoff,
    HomeGoals,
    AwayGoals,
    /// Site-side outcome code (`AS`). Carried, never trusted for settlement.
    WinnerCode,
    Other,
}

impl EventField {
    pub fn from_key(key: &str) -> Self {
        match key {
            "AA" => Self::EventId,
            "AE" => Self::Home,
            "AF" => Self::Away,
            "AD" => Self::Kickoff,
            "AG" => Self::HomeGoals,
            "AH" => Self::AwayGoals,
            "AS" => Self::WinnerCode,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedEvent {
    pub event_id: String,
    pub home: Option<String>,
    pub away: Option<String>,
    /// Kickoff in UTC, from unix seconds.
    pub kickoff: Option<NaiveDateTime>,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub winner_code: Option<String>,
    /// Filled by the odds stage, never by the extractor.
    pub odds: Option<RawOdds>,
}

impl DecodedEvent {
    /// Both goal counts present → the game is finished.
    pub fn score(&self) -> Option<(u32, u32)> {
        Some((self.home_goals?, self.away_goals?))
    }

    /// `"Home - Away"`, or the event id when the teams are missing.
    pub fn label(&self) -> String {
        match (&self.home, &self.away) {
            (Some(home), Some(away)) => format!("{home} - {away}"),
            _ => self.event_id.clone(),
        }
    }
}

pub fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    let secs: i64 = raw.trim().parse().ok()?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Extract one event. Groups without an event id (`AA`) are discarded.
pub fn extract_event(group: &CellGroup) -> Option<DecodedEvent> {
    let event_id = group.get("AA")?;
    let mut ev = DecodedEvent {
        event_id: event_id.clone(),
        ..Default::default()
    };

    for (key, value) in group {
        match EventField::from_key(key) {
            EventField::EventId | EventField::Other => {}
            EventField::Home => ev.home = Some(value.clone()),
            EventField::Away => ev.away = Some(value.clone()),
            EventField::Kickoff => {
                ev.kickoff = parse_kickoff(value);
                if ev.kickoff.is_none() {
                    debug!(event_id = %ev.event_id, raw = %value, "unparsable kickoff");
                }
            }
            EventField::HomeGoals => ev.home_goals = parse_goals(&ev.event_id, value),
            EventField::AwayGoals => ev.away_goals = parse_goals(&ev.event_id, value),
            EventField::WinnerCode => ev.winner_code = Some(value.clone()),
        }
    }

    Some(ev)
}

fn parse_goals(event_id: &str, raw: &str) -> Option<u32> {
    match raw.trim().parse() {
        Ok(goals) => Some(goals),
        Err(_) => {
            debug!(event_id, raw, "unparsable goal count");
            None
        }
    }
}

pub fn extract_events(doc: &FeedDocument) -> Vec<DecodedEvent> {
    doc.events.iter().filter_map(extract_event).collect()
}
