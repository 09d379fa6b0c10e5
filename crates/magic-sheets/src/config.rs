//! Session configuration

use std::env;
use std::time::Duration;

/// Default chat completion endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model for both the streaming and the tool-selection call
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for the assistant and its completion service
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// API key sent as a bearer token. Default: none.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API. Default: `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model name. Default: `gpt-4o`.
    pub model: String,
    /// Number of previous chat turns sent as history. Default: 10.
    pub history_turns: usize,
    /// Each history message is cut to this many characters. Default: 500.
    pub history_chars: usize,
    /// Ask the model to tidy sandbox stdout into CSV rows before mapping. Default: false.
    pub structure_analysis_output: bool,
    /// Timeout for a single HTTP request. Default: 60 seconds.
    pub request_timeout: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            history_turns: 10,
            history_chars: 500,
            structure_analysis_output: false,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl AssistantConfig {
    /// Defaults overridden by `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
    /// `MAGIC_SHEETS_MODEL`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(key) = non_empty_var("OPENAI_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(url) = non_empty_var("OPENAI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty_var("MAGIC_SHEETS_MODEL") {
            config.model = model;
        }

        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Configuration for the analysis sandbox process
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Python executable. Default: `python3`.
    pub python: String,
    /// Wall-clock limit for one run. Default: 5000 ms.
    pub timeout: Duration,
    /// Extra environment variables for the child process.
    pub env: Vec<(String, String)>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout: Duration::from_millis(5000),
            env: Vec::new(),
        }
    }
}
