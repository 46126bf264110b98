//! The query module answers natural-language questions about stored events.

use anyhow::Result;
use log::info;

use crate::chat::{ChatContext, send_prompt};
use crate::constants::NO_EVENTS_REPLY;
use crate::event::Event;

/// Renders events as one line each, as handed to the assistant model.
pub fn render_events(events: &[Event]) -> String {
    events
        .iter()
        .map(|event| {
            let date = event
                .date()
                .map_or_else(|| "Date unknown".to_owned(), |date| date.format("%d.%m.%Y").to_string());
            format!(
                "- {} on {date} in {} (Link: {})",
                event.title(),
                event.location(),
                event.source_url()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answers `question` about `events` using the assistant model.
///
/// Without events no request is sent and [`NO_EVENTS_REPLY`] is returned. The
/// model's answer is returned unmodified.
///
/// # Arguments
///
/// * `ctx` - Context containing the assistant model and rate limiter
/// * `question` - The user's question
/// * `events` - Stored events the answer should be based on
///
/// # Errors
///
/// Returns an error if the LLM chat operation fails
pub async fn answer_query(
    ctx: &ChatContext<'_>,
    question: &str,
    events: &[Event],
) -> Result<String> {
    if events.is_empty() {
        info!("No events stored, skipping assistant request");
        return Ok(NO_EVENTS_REPLY.to_owned());
    }

    let prompt = format!("Question: {question}\n\nEvents:\n{}", render_events(events));

    send_prompt(ctx, prompt).await
}
