//! Wire decoder for the delimited feed text.
//!
//! A feed is a sequence of rows separated by `~`. Every row is a sequence of
//! cells separated by `¬` and every meaningful cell is `KEY÷value`.
//!
//! ```text
//! SA÷1¬~ZA÷ENGLAND: Premier League¬~AA÷Qk1x¬AE÷Arsenal¬AF÷Chelsea¬AD÷1700000000¬~
//! ```

use std::collections::HashMap;

pub const ROW_SEP: char = '~';
pub const CELL_SEP: char = '¬';
pub const KV_SEP: char = '÷';

/// One event's cells, short key → raw value.
pub type CellGroup = HashMap<String, String>;

/// Meaning of a row, decided by the prefix of its first cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTag {
    /// `SA` — sport identifier for the whole feed
    Sport,
    /// `ZA` — league / tournament display name
    League,
    /// `AA` — start of one event's cell group
    Event,
    /// Known upstream tag that carries nothing we use
    Passive(&'static str),
    Unknown,
}

// Longer prefixes first so `RAA` never resolves as something shorter.
const TAG_TABLE: &[(&str, RowTag)] = &[
    ("RAA", RowTag::Passive("stats_results_type")),
    ("RAB", RowTag::Passive("stats_results_value")),
    ("SA", RowTag::Sport),
    ("ZA", RowTag::League),
    ("AA", RowTag::Event),
    ("QA", RowTag::Passive("moved_events")),
    ("SG", RowTag::Passive("top_leagues")),
    ("A1", RowTag::Passive("u_304")),
    ("A2", RowTag::Passive("refresh_utime")),
    ("UL", RowTag::Passive("download_ul_feed")),
    ("FG", RowTag::Passive("past_future_games")),
    ("PR", RowTag::Passive("participant")),
    ("ST", RowTag::Passive("special")),
];

impl RowTag {
    pub fn of_row(first_cell: &str) -> Self {
        TAG_TABLE
            .iter()
            .find(|(prefix, _)| first_cell.starts_with(prefix))
            .map(|(_, tag)| *tag)
            .unwrap_or(RowTag::Unknown)
    }
}

/// Decoded feed: header fields plus one cell group per event row, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub sport_id: Option<String>,
    pub league_name: Option<String>,
    pub events: Vec<CellGroup>,
    /// Rows skipped because of passive/unknown tags or a missing value.
    pub skipped_rows: usize,
}

/// Split one cell into `(key, value)`. The value ends at the next separator.
pub fn split_cell(cell: &str) -> Option<(&str, &str)> {
    let mut parts = cell.split(KV_SEP);
    let key = parts.next()?;
    let value = parts.next()?;
    Some((key, value))
}

/// Key/value pairs of a cell sequence; cells without a separator are dropped,
/// a repeated key keeps its last value.
pub fn cells_to_group<'a>(cells: impl IntoIterator<Item = &'a str>) -> CellGroup {
    let mut group = CellGroup::new();
    for cell in cells {
        if let Some((key, value)) = split_cell(cell) {
            group.insert(key.to_string(), value.to_string());
        }
    }
    group
}

/// Decode a feed blob. Empty input yields `None`.
pub fn decode_feed(content: &str) -> Option<FeedDocument> {
    if content.is_empty() {
        return None;
    }

    let mut doc = FeedDocument::default();

    for row in content.split(ROW_SEP) {
        let cells: Vec<&str> = row.split(CELL_SEP).collect();
        let first = cells.first().copied().unwrap_or_default();

        match RowTag::of_row(first) {
            RowTag::Sport => match split_cell(first) {
                Some((_, value)) => doc.sport_id = Some(value.to_string()),
                None => doc.skipped_rows += 1,
            },
            RowTag::League => match split_cell(first) {
                Some((_, value)) => doc.league_name = Some(value.to_string()),
                None => doc.skipped_rows += 1,
            },
            RowTag::Event => doc.events.push(cells_to_group(cells)),
            RowTag::Passive(_) | RowTag::Unknown => {
                // trailing separator leaves an empty row, not worth counting
                if !row.is_empty() {
                    doc.skipped_rows += 1;
                }
            }
        }
    }

    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group(pairs: &[(&str, &str)]) -> CellGroup {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn decodes_header_and_events_in_order() {
        let feed = "SA÷1¬~ZA÷ENGLAND: Premier League¬ZEE÷dYlOSQOD¬~\
                    AA÷ev1¬AE÷Arsenal¬AF÷Chelsea¬AD÷1700000000¬~\
                    AA÷ev2¬AE÷Everton¬AF÷Fulham¬AD÷1700003600¬~";

        let doc = decode_feed(feed).unwrap();

        assert_eq!(doc.sport_id.as_deref(), Some("1"));
        assert_eq!(doc.league_name.as_deref(), Some("ENGLAND: Premier League"));
        assert_eq!(
            doc.events,
            vec![
                group(&[("AA", "ev1"), ("AE", "Arsenal"), ("AF", "Chelsea"), ("AD", "1700000000")]),
                group(&[("AA", "ev2"), ("AE", "Everton"), ("AF", "Fulham"), ("AD", "1700003600")]),
            ]
        );
        assert_eq!(doc.skipped_rows, 0);
    }

    #[test]
    fn empty_input_is_no_result() {
        assert_eq!(decode_feed(""), None);
    }

    #[test]
    fn unknown_and_passive_rows_are_skipped() {
        let feed = "A1÷d41d8cd98f00b204e9800998ecf8427e¬~XY÷whatever¬~QA÷1¬~AA÷ev1¬AE÷A¬~";
        let doc = decode_feed(feed).unwrap();

        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.skipped_rows, 3);
        assert_eq!(doc.sport_id, None);
    }

    #[test]
    fn cells_without_separator_are_ignored() {
        let feed = "AA÷ev1¬garbage¬AE÷Home¬¬AF÷Away¬~";
        let doc = decode_feed(feed).unwrap();

        assert_eq!(
            doc.events[0],
            group(&[("AA", "ev1"), ("AE", "Home"), ("AF", "Away")])
        );
    }

    #[test]
    fn header_row_without_value_counts_as_skipped() {
        let doc = decode_feed("SA¬~ZA÷Serie A¬~").unwrap();
        assert_eq!(doc.sport_id, None);
        assert_eq!(doc.league_name.as_deref(), Some("Serie A"));
        assert_eq!(doc.skipped_rows, 1);
    }

    #[test]
    fn tag_table_prefers_longer_prefix() {
        assert_eq!(RowTag::of_row("RAA÷x"), RowTag::Passive("stats_results_type"));
        assert_eq!(RowTag::of_row("AA÷x"), RowTag::Event);
        assert_eq!(RowTag::of_row("AB÷x"), RowTag::Unknown);
        assert_eq!(RowTag::of_row(""), RowTag::Unknown);
    }

    #[test]
    fn value_stops_at_second_separator() {
        assert_eq!(split_cell("AE÷Home÷extra"), Some(("AE", "Home")));
        assert_eq!(split_cell("AE"), None);
    }
}
