//! HTTP client for the chat-completions service.
//!
//! [`LlamaClient`] implements both [`Analyzer`] and [`Aggregator`] against
//! `POST {base_url}/chat/completions`.
//!
//! # Credentials
//!
//! The API key is read from the environment variable named by
//! `service.api_key_env`. A missing key is only a warning: requests are
//! then sent without an `Authorization` header.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5), at most
//!   `service.max_retries` retries

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{AggregatorConfig, AnalyzerConfig, Config};
use crate::encode::EncodedImage;
use crate::normalize::{classify_content, AnalyzerResponse};
use crate::traits::{Aggregator, Analyzer};

pub struct LlamaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base: Duration,
    analyzer: AnalyzerConfig,
    aggregator: AggregatorConfig,
}

impl LlamaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let env_name = &config.service.api_key_env;
        let api_key = std::env::var(env_name).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %env_name,
                "no API key in environment, sending requests without credentials"
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.service.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.service.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.service.max_retries,
            backoff_base: Duration::from_secs(1),
            analyzer: config.analyzer.clone(),
            aggregator: config.aggregator.clone(),
        })
    }

    /// Override the credential picked up from the environment.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Override the first retry delay; later delays double from it.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// POST `body` with retry/backoff and return the response JSON.
    async fn complete(&self, body: &Value) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .http
                .post(self.endpoint())
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("request to {} failed: {}", self.endpoint(), e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after retries")))
    }
}

#[async_trait]
impl Analyzer for LlamaClient {
    async fn analyze(
        &self,
        chunk_index: usize,
        images: &[EncodedImage],
    ) -> Result<AnalyzerResponse> {
        let body = analysis_body(&self.analyzer, images);
        tracing::debug!(
            chunk = chunk_index,
            images = images.len(),
            model = %self.analyzer.model,
            "submitting chunk"
        );
        let json = self.complete(&body).await?;
        Ok(match completion_content(&json) {
            Some(content) => classify_content(content),
            None => {
                tracing::warn!(chunk = chunk_index, "no completion message in response");
                AnalyzerResponse::Opaque(json)
            }
        })
    }
}

#[async_trait]
impl Aggregator for LlamaClient {
    async fn aggregate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.aggregator.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_completion_tokens": self.aggregator.max_completion_tokens,
            "temperature": self.aggregator.temperature,
        });
        tracing::debug!(
            prompt_chars = prompt.len(),
            model = %self.aggregator.model,
            "submitting aggregation prompt"
        );
        let json = self.complete(&body).await?;
        Ok(report_text(&json))
    }
}

/// Request body for one chunk: one user message per image.
pub fn analysis_body(config: &AnalyzerConfig, images: &[EncodedImage]) -> Value {
    let messages: Vec<Value> = images
        .iter()
        .map(|image| {
            json!({
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": config.instruction.replace("{name}", &image.name),
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": image.data_url() },
                    },
                ],
            })
        })
        .collect();

    json!({
        "model": config.model,
        "messages": messages,
        "max_completion_tokens": config.max_completion_tokens,
        "temperature": config.temperature,
    })
}

/// The completion content, in either the native or the OpenAI-compatible layout.
pub fn completion_content(json: &Value) -> Option<&Value> {
    json.get("completion_message")
        .and_then(|m| m.get("content"))
        .or_else(|| json.pointer("/choices/0/message/content"))
}

/// Report text from an aggregation response.
///
/// A list yields its first message, a string or text object yields its
/// text, and anything else is kept as raw JSON rather than discarded.
pub fn report_text(json: &Value) -> String {
    match completion_content(json) {
        Some(content) => match classify_content(content) {
            AnalyzerResponse::PerItem(messages) => {
                messages.into_iter().next().unwrap_or_default()
            }
            AnalyzerResponse::SingleText(text) | AnalyzerResponse::StructuredWithText(text) => text,
            AnalyzerResponse::Opaque(value) => value.to_string(),
        },
        None => json.to_string(),
    }
}
