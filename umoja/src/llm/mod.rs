use anyhow::Result;

/// Core trait for chat-completion providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata, logged per call
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod remote;

/// Build a remote provider from config, reading the API key from the named env var.
pub fn provider_from_config(config: &common::RemoteLlmConfig) -> Result<remote::RemoteLlmProvider> {
    use anyhow::Context;

    let api_key = match config.api_key_env.as_deref() {
        Some(var) => std::env::var(var).with_context(|| format!("LLM API key env var '{}' not set", var))?,
        // local OpenAI-compatible servers usually need no key
        None => String::new(),
    };
    let model = config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let api_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());

    Ok(remote::RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
        config.timeout_seconds.unwrap_or(30),
        config.max_tokens.unwrap_or(500),
        0.3,
    ))
}
