//! The response module turns the extractor model's block-formatted answer into events.
//!
//! Expected shape, repeated once per event:
//!
//! ```text
//! EVENT_START
//! TITEL: <title>
//! DATUM: <dd.mm.yyyy | dd.mm.yyyy-dd.mm.yyyy | unbekannt>
//! ORT: <location | unbekannt>
//! EVENT_END
//! ```
//!
//! Parsing is best effort: malformed blocks are dropped and never fail the whole answer.

use chrono::NaiveDate;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::THINK_STRIPPER;
use crate::event::{Event, is_unknown};

const BLOCK_START: &str = "EVENT_START";
const BLOCK_END: &str = "EVENT_END";
const TITLE_LABEL: &str = "TITEL:";
const DATE_LABEL: &str = "DATUM:";
const LOCATION_LABEL: &str = "ORT:";

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

static FULL_YEAR_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("Failed to compile full year date regex")
});

static SHORT_YEAR_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{2})$").expect("Failed to compile short year date regex")
});

/// Parses every well-formed event block of `text`.
///
/// Blocks without an `EVENT_END` marker or without a non-empty `TITEL:` line are
/// skipped. Every event gets `source_url` as its source.
pub fn parse_events_response(text: &str, source_url: &str) -> Vec<Event> {
    let text = THINK_STRIPPER_REGEX.replace_all(text, "");

    text.split(BLOCK_START)
        .filter_map(|chunk| chunk.split_once(BLOCK_END).map(|(block, _)| block))
        .filter_map(|block| parse_block(block, source_url))
        .collect()
}

fn parse_block(block: &str, source_url: &str) -> Option<Event> {
    let title = field_value(block, TITLE_LABEL)?;
    let date = field_value(block, DATE_LABEL).and_then(parse_event_date);
    let location = field_value(block, LOCATION_LABEL);

    match Event::new(title, date, location, source_url) {
        Ok(event) => Some(event),
        Err(error) => {
            debug!("Dropping event block from {source_url}: {error}");
            None
        }
    }
}

/// Value of the first line in `block` starting with `label`.
fn field_value<'a>(block: &'a str, label: &str) -> Option<&'a str> {
    block
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
}

/// Parses the `DATUM:` value of an event block.
///
/// Only the start of a date range is kept. Both `dd.mm.yyyy` and `dd.mm.yy` are
/// accepted; two-digit years 00-68 map to 20xx and 69-99 to 19xx. Anything else
/// yields `None` with a warning.
pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() || is_unknown(value) {
        return None;
    }

    let value = match value.split_once('-') {
        Some((start, _)) if value.contains('.') => start.trim(),
        _ => value,
    };

    let parsed = parse_with(&FULL_YEAR_DATE_REGEX, value, Some)
        .or_else(|| parse_with(&SHORT_YEAR_DATE_REGEX, value, expand_short_year));

    if parsed.is_none() {
        warn!("Could not parse date: {value}");
    }

    parsed
}

fn parse_with(
    regex: &Regex,
    value: &str,
    year_of: impl Fn(i32) -> Option<i32>,
) -> Option<NaiveDate> {
    let captures = regex.captures(value)?;
    let number = |group: usize| captures.get(group)?.as_str().parse::<u32>().ok();

    let day = number(1)?;
    let month = number(2)?;
    let year = year_of(i32::try_from(number(3)?).ok()?)?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_short_year(year: i32) -> Option<i32> {
    match year {
        0..=68 => Some(2000 + year),
        69..=99 => Some(1900 + year),
        _ => None,
    }
}
