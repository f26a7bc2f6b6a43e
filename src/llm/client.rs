// HTTP client for OpenRouter-compatible chat-completions backends

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use super::error::LlmError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, WireMessage};
use super::LlmConfig;

/// The loop's view of the transport: an ordered list of role-tagged messages
/// maps to a single completion text. Swappable; tests script it.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[WireMessage], model: &str) -> Result<String, LlmError>;
}

/// Production transport over reqwest. Per-request timeouts live here; the
/// loop has no deadline of its own.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        debug!(
            base_url = %config.base_url,
            timeout_secs = config.request_timeout_secs,
            "initializing llm client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, messages: &[WireMessage], model: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
        };

        info!(model = %model, messages = messages.len(), "sending completion request");
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("HTTP-Referer", "https://github.com/muxmate/muxmate")
            .header("X-Title", "muxmate")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 401 {
            error!(status = status.as_u16(), "authentication rejected");
            return Err(LlmError::AuthenticationFailed(body));
        }
        if !status.is_success() {
            error!(status = status.as_u16(), "backend returned error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::NoChoices {
            model: model.to_string(),
        })?;

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            chars = choice.message.content.len(),
            "completion received"
        );
        Ok(choice.message.content)
    }
}
