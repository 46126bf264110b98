//! The eventscout library crawls event websites, extracts event records with an
//! LLM, stores them in a local database and answers questions about them.

pub mod chat;
pub mod constants;
pub mod event;
pub mod extract;
pub mod filter;
pub mod parse;
pub mod pipeline;
pub mod query;
pub mod response;
pub mod scrape;
pub mod storage;

/// Enum representing the page text extraction method.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum TextBy {
    /// Use dom_smoothie for text extraction
    #[default]
    DomSmoothie,
    /// Use fast_html2md for text extraction
    FastHtml2Md,
}

impl std::str::FromStr for TextBy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "dom_smoothie" => Ok(TextBy::DomSmoothie),
            "fast_html2md" => Ok(TextBy::FastHtml2Md),
            _ => Err(format!("Invalid text extraction method: {}", input)),
        }
    }
}

pub use event::Event;
pub use filter::is_relevant;
pub use pipeline::{CrawlContext, CrawlSummary, crawl_all, crawl_if_empty};
pub use query::answer_query;
pub use response::{parse_event_date, parse_events_response};
pub use scrape::{CrawlSettings, CrawledPage, DeepCrawler, SpiderCrawler, crawl_site};
pub use storage::Storage;
