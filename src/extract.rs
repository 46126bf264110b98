//! The extract module asks the extraction model for the events contained in crawled text.

use log::{error, info};

use crate::chat::{ChatContext, send_prompt};
use crate::constants::MAX_EXTRACTION_CHARS;
use crate::event::Event;
use crate::response::parse_events_response;

/// Extracts events from crawled page text.
///
/// The text is cut to [`MAX_EXTRACTION_CHARS`] characters before it is sent. The
/// model behind `ctx` is expected to carry the extraction system prompt and a low
/// temperature. A failed request is logged and yields no events.
///
/// # Arguments
///
/// * `ctx` - Context containing the extraction model and rate limiter
/// * `page_text` - Combined text of the crawled pages
/// * `source_url` - The seed URL the text was crawled from
pub async fn extract_events(
    ctx: &ChatContext<'_>,
    page_text: &str,
    source_url: &str,
) -> Vec<Event> {
    let page_text = truncate_chars(page_text, MAX_EXTRACTION_CHARS);
    let prompt = format!("Extract all events from this HTML:\n\n{page_text}");

    match send_prompt(ctx, prompt).await {
        Ok(response) => parse_events_response(&response, source_url),
        Err(err) => {
            error!("Event extraction for {source_url} failed: {err:#}");
            Vec::new()
        }
    }
}

/// Returns at most the first `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => {
            info!("Truncated content to {max_chars} characters");
            text.get(..end).unwrap_or(text)
        }
        None => text,
    }
}
