#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use eventscout::{CrawledPage, DeepCrawler};
use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};
use url::Url;

#[macro_export]
macro_rules! assert_extractions {
    (
        $(
            $test_name:ident : response => $response:expr, titles => [$($title:expr),* $(,)?]
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let model = StubLlmProvider::new($response.to_owned());
                let context = eventscout::chat::ChatContext {
                    model: &model,
                    rate_limiter: None,
                };
                let events = eventscout::extract::extract_events(
                    &context,
                    "page text",
                    "https://example.org/veranstaltungen",
                )
                .await;

                let titles: Vec<&str> = events.iter().map(|event| event.title()).collect();
                let expected: Vec<&str> = vec![$($title),*];
                assert_that(&titles).is_equal_to(expected);
            }
        )+
    }
}

/// Chat provider answering every request with the same text, or failing.
pub(crate) struct StubLlmProvider {
    response_content: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(response_content: String) -> Self {
        StubLlmProvider {
            response_content: Some(response_content),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        StubLlmProvider {
            response_content: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts mutex").clone()
    }
}

impl ChatProvider for StubLlmProvider {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            #[derive(Debug)]
            struct StringResponse(String);

            impl ChatResponse for StringResponse {
                fn text(&self) -> Option<String> {
                    Some(self.0.clone())
                }

                fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
                    panic!()
                }

                fn thinking(&self) -> Option<String> {
                    None
                }

                fn usage(&self) -> Option<llm::chat::Usage> {
                    None
                }
            }

            impl std::fmt::Display for StringResponse {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(formatter, "{}", self.0)
                }
            }

            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .expect("prompts mutex")
                .extend(messages.iter().map(|message| message.content.clone()));

            match &self.response_content {
                Some(content) => {
                    Ok(Box::new(StringResponse(content.clone())) as Box<dyn ChatResponse>)
                }
                None => Err(LLMError::ProviderError("stub failure".to_owned())),
            }
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!()
    }
}

/// Crawler serving canned pages per seed; unknown seeds fail.
#[derive(Default)]
pub(crate) struct StubCrawler {
    sites: HashMap<String, Vec<CrawledPage>>,
    calls: AtomicUsize,
}

impl StubCrawler {
    pub fn with_site(mut self, seed: &str, pages: Vec<CrawledPage>) -> Self {
        self.sites.insert(seed.to_owned(), pages);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl DeepCrawler for StubCrawler {
    async fn deep_crawl(&self, seed: &Url) -> Result<Vec<CrawledPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sites
            .get(seed.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

pub(crate) fn page(index: usize, url: &str, markdown: &str) -> CrawledPage {
    CrawledPage {
        index,
        url: url.to_owned(),
        markdown: Some(markdown.to_owned()),
        html: String::new(),
    }
}
