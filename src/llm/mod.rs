// LLM transport: role-tagged messages in, one completion text out
//
// The loop neither knows nor cares which backend answers; anything speaking
// the OpenRouter-compatible chat-completions schema works.

pub mod client;
pub mod error;
pub mod types;

pub use client::{CompletionClient, LlmClient};
pub use error::LlmError;
pub use types::{Role, WireMessage};

/// Transport configuration, extracted from the application config.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            request_timeout_secs: 120,
        }
    }
}
