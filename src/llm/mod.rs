//! Chat-completion client
//!
//! One request per call, no retries. [`CompletionClient::ask`] never returns
//! an error: failures come back as a [`Completion`] whose content is the
//! error text and whose token counts are zero, so the caller can still print
//! and record something.

pub mod prompts;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EffectiveConfig;
use crate::error::ConfigError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Generated text plus usage counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    /// Cost reported by the provider, if it reports one
    pub cost: Option<f64>,
    pub model: Option<String>,
    pub failed: bool,
}

impl Completion {
    fn failure(message: String) -> Self {
        Self {
            content: message,
            failed: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verbosity: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_tier: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(default)]
    cost: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

impl From<ChatResponse> for Completion {
    fn from(response: ChatResponse) -> Self {
        let usage = response.usage.unwrap_or_default();
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Self {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cached_tokens: usage
                .prompt_tokens_details
                .map(|d| d.cached_tokens)
                .unwrap_or(0),
            cost: usage.cost,
            model: response.model,
            failed: false,
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct CompletionClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    verbosity: Option<String>,
    reasoning_effort: Option<String>,
    service_tier: Option<String>,
}

impl CompletionClient {
    /// Fails before any network activity when no API key is configured
    pub fn new(config: &EffectiveConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            verbosity: config.verbosity.clone(),
            reasoning_effort: config.reasoning_effort.clone(),
            service_tier: config.service_tier.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, system: &'a str, user: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_completion_tokens: self.max_tokens,
            temperature: self.temperature,
            verbosity: self.verbosity.as_deref(),
            reasoning_effort: self.reasoning_effort.as_deref(),
            service_tier: self.service_tier.as_deref(),
        }
    }

    /// Ask for a completion; errors are folded into the returned content
    pub async fn ask(&self, system: &str, user: &str) -> Completion {
        match self.execute_request(system, user).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Completion request failed: {}", e);
                Completion::failure(format!("Error: {}", e))
            }
        }
    }

    async fn execute_request(&self, system: &str, user: &str) -> Result<Completion> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} with model {}", endpoint, self.model);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(system, user))
            .send()
            .await
            .map_err(|e| anyhow!("Request failed: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response: {}", e))?;

        if !status.is_success() {
            return Err(anyhow!(
                "API request failed with status {}: {}",
                status,
                body
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse response: {} - Body: {}", e, body))?;

        Ok(parsed.into())
    }
}
