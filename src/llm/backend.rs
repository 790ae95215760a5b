//! Completion backends - the seam between the translator and a language model

use crate::config::{BackendKind, LlmConfig};
use crate::error::DrawResult;
use crate::llm::ollama_client::OllamaClient;
use crate::llm::openai_client::OpenAiClient;
use async_trait::async_trait;
use std::sync::Arc;

/// A text-completion service driven with temperature 0
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete `prompt`, returning the raw model output
    async fn complete(&self, prompt: &str) -> DrawResult<String>;

    /// Backend identifier for logs and the audit trail
    fn name(&self) -> &str;
}

/// Build the configured backend
pub fn build_backend(config: &LlmConfig) -> DrawResult<Arc<dyn CompletionBackend>> {
    let backend: Arc<dyn CompletionBackend> = match config.backend {
        BackendKind::Ollama => Arc::new(OllamaClient::from_config(config)?),
        BackendKind::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
    };
    Ok(backend)
}
