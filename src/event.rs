//! The event module holds the single domain record produced by extraction
//! and persisted by the storage layer.

use anyhow::{Result, bail};
use chrono::NaiveDate;

use crate::constants::UNKNOWN_LOCATION;

/// Represents an event extracted from a crawled page.
///
/// Events are only built through [`Event::new`], so a title is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    id: Option<i64>,
    title: String,
    date: Option<NaiveDate>,
    location: String,
    source_url: String,
}

impl Event {
    /// Creates a new event that has not been stored yet.
    ///
    /// Surrounding whitespace is trimmed from every text field. A missing, blank
    /// or `unbekannt` location becomes [`UNKNOWN_LOCATION`].
    ///
    /// # Errors
    ///
    /// Returns an error if the title is empty after trimming.
    pub fn new(
        title: &str,
        date: Option<NaiveDate>,
        location: Option<&str>,
        source_url: &str,
    ) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Event title must not be empty");
        }

        let location = match location.map(str::trim) {
            Some(location) if !location.is_empty() && !is_unknown(location) => location,
            _ => UNKNOWN_LOCATION,
        };

        Ok(Self {
            id: None,
            title: title.to_owned(),
            date,
            location: location.to_owned(),
            source_url: source_url.trim().to_owned(),
        })
    }

    pub(crate) fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Storage identity, `None` until the event has been loaded from the store.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Checks whether the extractor's "unknown" marker was given.
pub(crate) fn is_unknown(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(UNKNOWN_LOCATION)
}
