//! Anthropic Messages API client
//!
//! Single-shot (non-streaming) completion requests. The client degrades to a
//! `Disabled` variant when no API key is configured so the rest of the
//! service can run without LLM features.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use dhub_common::{Config, Error, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default timeout for completion requests. Letter generation runs long.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Low-level Anthropic API client.
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(AnthropicClient {
            http,
            api_key,
            model,
        })
    }

    /// Send a system + user prompt and return the completion text.
    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        debug!(model = %self.model, max_tokens, "sending completion request");

        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": user }]
        });

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("LLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "LLM API returned {}: {}",
                status, detail
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::External(format!("LLM response parse failed: {}", e)))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(Error::External("LLM returned no text content".to_string()));
        }

        Ok(text)
    }
}

/// High-level wrapper that is either an active client or disabled.
pub enum LlmClient {
    Active(AnthropicClient),
    Disabled,
}

impl LlmClient {
    /// Build from config: `Active` when an API key is present, otherwise
    /// `Disabled`.
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.anthropic_api_key {
            Some(key) if !key.is_empty() => Ok(LlmClient::Active(AnthropicClient::new(
                key.clone(),
                config.anthropic_model.clone(),
            )?)),
            _ => Ok(LlmClient::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        match self {
            LlmClient::Active(client) => client.complete(system, user, max_tokens).await,
            LlmClient::Disabled => Err(Error::External(
                "LLM not configured (set ANTHROPIC_API_KEY)".to_string(),
            )),
        }
    }
}

/// Strip an optional Markdown code fence from a model answer that should be
/// bare JSON.
pub fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag ("json") up to the first newline
    let inner = match inner.find('\n') {
        Some(pos) => &inner[pos + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
