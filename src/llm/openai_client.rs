//! OpenAI-compatible chat completions client

use crate::config::LlmConfig;
use crate::error::{DrawError, DrawResult};
use crate::llm::backend::CompletionBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: Option<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: api_key.into(),
            max_tokens: 512,
            client: Client::new(),
        }
    }

    /// Reads the API key from the environment variable named in the config
    pub fn from_config(config: &LlmConfig) -> DrawResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DrawError::config(format!(
                "environment variable {} must hold the API key",
                config.api_key_env
            ))
        })?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DrawError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_tokens: config.max_tokens,
            ..Self::new(config.base_url.clone(), config.model.clone(), api_key)
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, prompt: &str) -> DrawResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DrawError::translation_with_cause("failed to send request to the completion API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DrawError::translation_with_cause(
                format!("completion API returned HTTP {}", status),
                body,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DrawError::translation_with_cause("failed to parse completion response", e))?;
        debug!(model = %self.model, choices = parsed.choices.len(), "Chat completion received");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DrawError::translation("completion response contained no message"))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> DrawResult<String> {
        self.chat(prompt).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}
