use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

use crate::llm::{LlmProvider, LlmRequest};

/// Renders text into a target language
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Returns text unchanged. Used when no translation backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait::async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Translation through a chat-completion model
pub struct LlmTranslator {
    provider: Arc<dyn LlmProvider>,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let prompt = format!(
            "Translate the following text into the language with code '{}'. \
             Keep names and numbers unchanged. Reply with the translation only.\n\nTEXT:\n{}",
            target_language, text
        );
        let mut request = LlmRequest::new(prompt);
        request.temperature = Some(0.2);

        let response = self.provider.generate(request).await?;
        debug!(
            target_language,
            model = %response.model,
            tokens = response.usage.total_tokens,
            "llm translation done"
        );
        if response.content.is_empty() {
            bail!("empty translation from model {}", response.model);
        }
        Ok(response.content)
    }
}
