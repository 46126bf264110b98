//! The chat module holds the plumbing shared by every LLM request: building a
//! provider from a model URL and sending single-turn prompts under a rate limit.

use anyhow::{Context, Result};
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider};
use log::{debug, info};
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::constants::MODEL_API_KEY_ENV_NAME;

/// Shared data for requests sent to one LLM provider.
pub struct ChatContext<'a> {
    /// LLM model to send prompts to
    pub model: &'a dyn ChatProvider,
    /// Rate limiter for controlling request frequency
    pub rate_limiter: Option<&'a StdTokenBucket>,
}

/// Creates an LLM builder from a model URL such as `openai://gpt-4o-mini`.
///
/// The scheme selects the backend, the host (plus an optional user part, joined
/// with `:`) names the model. The API key is read from
/// [`MODEL_API_KEY_ENV_NAME`] when set.
///
/// # Errors
///
/// Returns an error if the URL is invalid, names an unknown backend or has no model.
pub fn model_builder(model: &str) -> Result<LLMBuilder> {
    let model_url = Url::parse(model).map_err(|e| anyhow::anyhow!("Invalid model URL: {}", e))?;
    let llm_builder = LLMBuilder::new()
        .backend(
            LLMBackend::from_str(model_url.scheme())
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(
            [
                model_url
                    .host_str()
                    .context("Specify model name as host URL.")?,
                model_url.username(),
            ]
            .iter()
            .filter(|x| !x.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(":"),
        );

    Ok(match std::env::var(MODEL_API_KEY_ENV_NAME) {
        Ok(model_key) => {
            info!("API key is provided via {MODEL_API_KEY_ENV_NAME}");
            llm_builder.api_key(model_key)
        }
        Err(err) => {
            info!("{err} while providing api key");
            llm_builder
        }
    })
}

/// Builds a token bucket allowing `rpm` requests per minute.
pub fn rate_limiter(rpm: u32) -> Option<StdTokenBucket> {
    let capacity = u64::from(rpm.max(1));
    let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

    TokenBucketBuilder::builder()
        .capacity(capacity)
        .refill_amount(1_u64)
        .refill_every(refill_interval)
        .with_time(rate_guard::StdTimeSource::new())
        .with_precision::<rate_guard::Nanos>()
        .build()
        .ok()
}

/// Sends `prompt` as a single user turn and returns the raw response text.
///
/// # Errors
///
/// Returns an error if the LLM chat operation fails.
pub async fn send_prompt(ctx: &ChatContext<'_>, prompt: String) -> Result<String> {
    let messages = vec![ChatMessage::user().content(prompt).build()];

    if let Some(limiter) = ctx.rate_limiter {
        loop {
            match limiter.try_acquire(1) {
                Ok(()) => break,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    let text = ctx
        .model
        .chat(&messages)
        .await
        .map_err(|err| anyhow::anyhow!("LLM error: {err}."))?
        .to_string();
    debug!("LLM answered with {} characters", text.chars().count());

    Ok(text)
}
