//! Ollama Client - Integration with Ollama LLM server

use crate::config::LlmConfig;
use crate::error::{DrawError, DrawResult};
use crate::llm::backend::CompletionBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Ollama API client
pub struct OllamaClient {
    base_url: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32, // Max tokens to generate
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: 512,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> DrawResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DrawError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_tokens: config.max_tokens,
            ..Self::new(config.base_url.clone(), config.model.clone())
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a completion
    pub async fn generate(&self, prompt: &str) -> DrawResult<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: self.max_tokens,
                temperature: 0.0,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DrawError::translation_with_cause("failed to send request to Ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DrawError::translation_with_cause(
                format!("Ollama returned HTTP {}", status),
                body,
            ));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| DrawError::translation_with_cause("failed to parse Ollama response", e))?;
        debug!(model = %self.model, done = ollama_response.done, "Ollama completion received");

        Ok(ollama_response.response)
    }

    /// Check if Ollama server is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, prompt: &str) -> DrawResult<String> {
        self.generate(prompt).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = OllamaClient::default();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_request_is_deterministic() {
        let request = OllamaRequest {
            model: "llama3.2",
            prompt: "p",
            stream: false,
            options: OllamaOptions { num_predict: 64, temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config = LlmConfig {
            base_url: Some("http://gpu-box:11434/".to_string()),
            model: Some("qwen2.5".to_string()),
            ..LlmConfig::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://gpu-box:11434");
        assert_eq!(client.model(), "qwen2.5");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_translation_error() {
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert!(!client.health_check().await);
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, DrawError::Translation { .. }));
    }
}
