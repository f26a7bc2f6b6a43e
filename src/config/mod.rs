// Configuration: TOML file under the user config dir, environment overrides
// on top, plus process-lifetime session overrides adjusted from the REPL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("OpenRouter API key is required. Set openrouter.api_key in the config file or the MUXMATE_OPENROUTER_API_KEY environment variable")]
    MissingApiKey,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &if self.api_key.is_empty() { "unset" } else { "[REDACTED]" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Prompt template overrides. `base_system` replaces the built-in base
/// wholesale; the other three are appended after the base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    pub base_system: Option<String>,
    pub chat_assistant: Option<String>,
    pub chat_assistant_prepared: Option<String>,
    pub watch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Seconds between busy-wait and watch-mode iterations.
    #[serde(default = "default_wait_interval")]
    pub wait_interval: u64,

    /// Estimated-token threshold above which history is squashed.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_true")]
    pub exec_confirm: bool,

    #[serde(default = "default_true")]
    pub send_keys_confirm: bool,

    #[serde(default = "default_true")]
    pub paste_multiline_confirm: bool,

    /// Dump per-iteration transcripts to <config_dir>/debug/.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub prompts: PromptsConfig,
}

fn default_wait_interval() -> u64 {
    5
}

fn default_max_context_tokens() -> usize {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openrouter: OpenRouterConfig::default(),
            wait_interval: default_wait_interval(),
            max_context_tokens: default_max_context_tokens(),
            exec_confirm: true,
            send_keys_confirm: true,
            paste_multiline_confirm: true,
            debug: false,
            prompts: PromptsConfig::default(),
        }
    }
}

/// Directory holding config.toml, the REPL history and debug dumps.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("muxmate")
}

impl Config {
    /// Load from an explicit path or the default location, then apply
    /// environment overrides. A missing file yields defaults; the API key
    /// is validated by the caller once overrides are in.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config_dir().join("config.toml"));

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MUXMATE_OPENROUTER_API_KEY") {
            self.openrouter.api_key = v;
        }
        if let Ok(v) = std::env::var("MUXMATE_OPENROUTER_BASE_URL") {
            self.openrouter.base_url = v;
        }
        if let Ok(v) = std::env::var("MUXMATE_OPENROUTER_MODEL") {
            self.openrouter.model = v;
        }
        if let Ok(v) = std::env::var("MUXMATE_DEBUG") {
            self.debug = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    /// Fail fast before the loop ever starts.
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        if self.openrouter.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

/// Session-only overrides: `/config set <key> <value>` adjusts behavior for
/// the current process lifetime without touching the file on disk.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    values: HashMap<String, String>,
}

impl SessionOverrides {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| matches!(v, "1" | "true" | "yes" | "on"))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}
