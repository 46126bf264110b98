//! The scrape module deep-crawls a seed URL and combines the text of the pages
//! that look like event listings.

extern crate spider;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use scraper::Selector as ScraperSelector;
use spider::configuration::Configuration;
use spider::website::Website;
use tokio::sync::broadcast::{self, error::RecvError};
use url::Url;

use crate::TextBy;
use crate::filter::is_relevant;
use crate::parse::extract_text;

/// A page returned by a deep crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawledPage {
    /// Position in crawl order, counting pages that failed to load; 0 is the seed
    pub index: usize,
    /// URL of the page itself
    pub url: String,
    /// Readable text already extracted from the page, if any
    pub markdown: Option<String>,
    /// Raw page content
    pub html: String,
}

impl CrawledPage {
    /// Text to analyze: the extracted markdown, or the raw content when none exists.
    pub fn body(&self) -> Option<&str> {
        self.markdown
            .as_deref()
            .filter(|markdown| !markdown.trim().is_empty())
            .or(Some(self.html.as_str()))
            .filter(|body| !body.is_empty())
    }
}

/// Breadth-first crawler restricted to the seed's own domain.
///
/// Returned futures are not `Send`; crawls are awaited in place, one seed at a time.
#[async_trait(?Send)]
pub trait DeepCrawler: Send + Sync {
    /// Crawls from `seed` and returns the fetched pages in crawl order.
    ///
    /// # Errors
    ///
    /// Returns an error if the crawler cannot be set up or no page at all
    /// could be fetched from `seed`.
    async fn deep_crawl(&self, seed: &Url) -> Result<Vec<CrawledPage>>;
}

/// Settings of the [`SpiderCrawler`].
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Maximum link depth followed from the seed
    pub max_depth: usize,
    /// Maximum number of pages fetched per seed
    pub max_pages: u32,
    /// Delay between requests in milliseconds
    pub delay: u64,
    pub user_agent: String,
    /// Text extraction method applied to every fetched page
    pub text_by: TextBy,
    /// CSS selector to limit the HTML subset from which text is extracted
    pub selector: Option<ScraperSelector>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            delay: 0,
            user_agent: "EventScout Bot".to_owned(),
            text_by: TextBy::default(),
            selector: None,
        }
    }
}

/// [`DeepCrawler`] backed by the `spider` crawler.
pub struct SpiderCrawler {
    settings: CrawlSettings,
}

impl SpiderCrawler {
    pub fn new(settings: CrawlSettings) -> Self {
        Self { settings }
    }

    fn configuration(&self) -> Configuration {
        Configuration::new()
            .with_user_agent(Some(self.settings.user_agent.as_str()))
            .with_subdomains(false)
            .with_redirect_limit(3)
            .with_retry(1)
            .with_depth(self.settings.max_depth)
            .with_limit(self.settings.max_pages)
            .with_respect_robots_txt(true)
            .with_delay(self.settings.delay)
            .build()
    }
}

#[async_trait(?Send)]
impl DeepCrawler for SpiderCrawler {
    async fn deep_crawl(&self, seed: &Url) -> Result<Vec<CrawledPage>> {
        let mut website = Website::new(seed.as_str())
            .with_config(self.configuration())
            .build()?;

        let mut receiver = website
            .subscribe(channel_capacity(self.settings.max_pages))
            .context("Unable to create receiver.")?;

        let text_by = self.settings.text_by.clone();
        let selector = self.settings.selector.clone();
        let handle = tokio::spawn(async move {
            let mut pages = Vec::new();
            let mut failures = Vec::new();
            let mut index = 0;

            while let Some(page) = next_message(&mut receiver).await {
                let page_index = index;
                index += 1;
                info!("Crawled {} with {}", page.get_url(), page.status_code);

                if !page.status_code.is_success() {
                    warn!("Skipping {} as {}", page.get_url(), page.status_code);
                    failures.push(format!("{} answered {}", page.get_url(), page.status_code));
                    continue;
                }

                let html = page.get_html();
                let markdown = match extract_text(&html, &text_by, selector.as_ref()) {
                    Ok(text) => Some(text),
                    Err(extract_error) => {
                        debug!(
                            "Falling back to raw content of {}: {extract_error}",
                            page.get_url()
                        );
                        None
                    }
                };

                pages.push(CrawledPage {
                    index: page_index,
                    url: page.get_url().to_string(),
                    markdown,
                    html,
                });
            }

            (pages, failures)
        });

        info!("Starting deep crawl (depth {}) on {seed}", self.settings.max_depth);
        website.crawl().await;
        website.unsubscribe();
        let (pages, failures) = handle.await.context("Task failed to complete")?;

        if pages.is_empty()
            && let Some(failure) = failures.first()
        {
            bail!("No page could be fetched: {failure}");
        }

        Ok(pages)
    }
}

/// Buffer size of the page channel; large enough to hold a whole crawl.
fn channel_capacity(max_pages: u32) -> usize {
    usize::try_from(max_pages).map_or(usize::MAX, |max_pages| max_pages.max(888))
}

/// Receives the next message, skipping over messages lost to a lagging receiver.
///
/// Returns `None` once the channel is closed.
async fn next_message<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> Option<T> {
    loop {
        match receiver.recv().await {
            Ok(message) => return Some(message),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Page receiver lagged, {skipped} pages were dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Crawls `seed` and returns the combined text of its relevant pages.
///
/// Any crawl failure is logged and yields an empty string.
pub async fn crawl_site(crawler: &dyn DeepCrawler, seed: &Url) -> String {
    match try_crawl_site(crawler, seed).await {
        Ok(content) => content,
        Err(crawl_error) => {
            error!("Error crawling {seed}: {crawl_error:#}");
            String::new()
        }
    }
}

/// Crawls `seed` and returns the combined text of its relevant pages.
///
/// Pages are kept in crawl order when they have a body, their own URL passes
/// [`is_relevant`] and their trimmed body is not empty. Each kept page is prefixed
/// with a marker naming it as main page (crawl index 0) or subpage by its
/// [`CrawledPage::index`].
///
/// # Errors
///
/// Returns an error if the crawl of the seed fails as a whole.
pub async fn try_crawl_site(crawler: &dyn DeepCrawler, seed: &Url) -> Result<String> {
    let pages = crawler
        .deep_crawl(seed)
        .await
        .with_context(|| format!("Deep crawl of {seed} failed"))?;

    if pages.is_empty() {
        warn!("No results returned for {seed}");
        return Ok(String::new());
    }

    info!("Processing {} crawled pages...", pages.len());

    let mut kept = Vec::new();
    for page in &pages {
        let Some(body) = page.body() else {
            debug!("No textual content for {}, skipping", page.url);
            continue;
        };

        if !is_relevant(&page.url) {
            debug!("Filtered out non-event page: {}", page.url);
            continue;
        }

        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        let marker = match page.index {
            0 => "MAIN PAGE".to_owned(),
            index => format!("SUBPAGE {index}"),
        };
        kept.push(format!("=== {marker}: {} ===\n{body}", page.url));
    }

    info!(
        "Kept {} pages, filtered out {} pages",
        kept.len(),
        pages.len() - kept.len()
    );

    if kept.is_empty() {
        warn!("No relevant event content found for {seed}");
        return Ok(String::new());
    }

    let combined = kept.join("\n\n");
    info!("Total combined content length: {}", combined.chars().count());

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn markdown_is_preferred_over_raw_content() {
        let page = CrawledPage {
            index: 0,
            url: "https://a.de/events".to_owned(),
            markdown: Some("# Termine".to_owned()),
            html: "<h1>Termine</h1>".to_owned(),
        };
        assert_that(&page.body()).is_equal_to(Some("# Termine"));
    }

    #[test]
    fn raw_content_is_used_without_markdown() {
        let page = CrawledPage {
            index: 0,
            url: "https://a.de/events".to_owned(),
            markdown: Some("  ".to_owned()),
            html: "<h1>Termine</h1>".to_owned(),
        };
        assert_that(&page.body()).is_equal_to(Some("<h1>Termine</h1>"));
    }

    #[test]
    fn page_without_content_has_no_body() {
        assert_that(&CrawledPage::default().body()).is_none();
    }

    #[test]
    fn channel_holds_a_whole_crawl() {
        assert_that(&channel_capacity(50)).is_equal_to(888);
        assert_that(&channel_capacity(5_000)).is_equal_to(5_000);
    }

    #[tokio::test]
    async fn lagging_receiver_keeps_receiving() {
        let (sender, mut receiver) = broadcast::channel(2);
        for message in 0..5 {
            sender.send(message).expect("receiver alive");
        }
        drop(sender);

        assert_that(&next_message(&mut receiver).await).is_equal_to(Some(3));
        assert_that(&next_message(&mut receiver).await).is_equal_to(Some(4));
        assert_that(&next_message(&mut receiver).await).is_none();
    }
}
