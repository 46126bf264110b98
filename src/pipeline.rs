//! The pipeline module runs the full crawl, extract and save cycle over all seeds.

use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use url::Url;

use crate::chat::ChatContext;
use crate::constants::MIN_CONTENT_CHARS;
use crate::extract::extract_events;
use crate::scrape::{DeepCrawler, try_crawl_site};
use crate::storage::Storage;

/// Components used by a crawl cycle.
pub struct CrawlContext<'a> {
    pub crawler: &'a dyn DeepCrawler,
    /// Context of the extraction model
    pub extractor: ChatContext<'a>,
    pub storage: &'a Storage,
}

/// Summary of a crawl cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub message: String,
    /// Events extracted in this cycle, duplicates included
    pub events_found: usize,
    /// Events that were new to the store
    pub events_saved: usize,
    pub urls_crawled: usize,
    /// Per-seed failures, `None` when every seed succeeded
    pub errors: Option<Vec<String>>,
}

/// Crawls every seed in order, extracts its events and saves them in one batch.
///
/// Crawl failures, insufficient content and failed extractions are recorded per
/// seed and never stop the cycle.
///
/// # Arguments
///
/// * `ctx` - Crawler, extraction model and storage to use
/// * `seeds` - Seed URLs as configured; invalid ones are reported as errors
///
/// # Errors
///
/// Returns an error only if saving the extracted events fails
pub async fn crawl_all(ctx: &CrawlContext<'_>, seeds: &[String]) -> Result<CrawlSummary> {
    let mut all_events = Vec::new();
    let mut errors = Vec::new();

    for seed in seeds {
        info!("Starting crawl: {seed}");

        let seed_url = match Url::parse(seed) {
            Ok(seed_url) => seed_url,
            Err(parse_error) => {
                let error_msg = format!("{seed}: Invalid URL ({parse_error})");
                warn!("{error_msg}");
                errors.push(error_msg);
                continue;
            }
        };

        let content = match try_crawl_site(ctx.crawler, &seed_url).await {
            Ok(content) => content,
            Err(crawl_error) => {
                let error_msg = format!("{seed}: {crawl_error:#}");
                warn!("{error_msg}");
                errors.push(error_msg);
                continue;
            }
        };

        let content_chars = content.chars().count();
        if content_chars < MIN_CONTENT_CHARS {
            let error_msg = format!("{seed}: Insufficient content");
            warn!("{error_msg}");
            errors.push(error_msg);
            continue;
        }
        info!("Crawled {content_chars} characters from {seed}");

        let events = extract_events(&ctx.extractor, &content, seed).await;
        if events.is_empty() {
            warn!("No events found in {seed}");
        } else {
            info!("Extracted {} events from {seed}", events.len());
            all_events.extend(events);
        }
    }

    let events_saved = if all_events.is_empty() {
        warn!("No events found to save");
        0
    } else {
        ctx.storage.save_events(&all_events)?.inserted
    };

    Ok(CrawlSummary {
        message: "Crawling completed".to_owned(),
        events_found: all_events.len(),
        events_saved,
        urls_crawled: seeds.len(),
        errors: (!errors.is_empty()).then_some(errors),
    })
}

/// Runs [`crawl_all`] only when the store holds no events yet.
///
/// # Returns
///
/// Returns `None` without crawling when events are already stored
///
/// # Errors
///
/// Returns an error if counting or saving events fails
pub async fn crawl_if_empty(
    ctx: &CrawlContext<'_>,
    seeds: &[String],
) -> Result<Option<CrawlSummary>> {
    let stored = ctx.storage.count_events()?;
    if stored > 0 {
        info!("Database contains {stored} events, skipping crawl");
        return Ok(None);
    }

    info!("Database empty, starting crawl...");
    crawl_all(ctx, seeds).await.map(Some)
}

/// Parses seed URLs listed one per line; blank lines and `#` comments are skipped.
pub fn parse_seeds(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// Reads seed URLs from a file in the [`parse_seeds`] format.
///
/// # Errors
///
/// Returns an error if the file cannot be read
pub fn read_seeds_file(file: &str) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(file).context(format!("Failed to read seeds file: {file}"))?;

    Ok(parse_seeds(&content))
}
