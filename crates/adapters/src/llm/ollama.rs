//! Ollama local LLM adapter

use async_trait::async_trait;
use newsroom_domain::{LlmBackend, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmConfig, endpoint};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama backend using the generate endpoint
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OllamaBackend {
    pub fn with_base_url(base_url: String, config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            config,
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: i32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: &self.config.model,
            prompt: user,
            system: Some(system).filter(|s| !s.is_empty()),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_output_tokens as i32,
            },
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Api(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("API returned {}: {}", status, body)));
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidFormat(e.to_string()))?;

        let text = api_response.response.trim();
        if text.is_empty() {
            return Err(LlmError::InvalidFormat("Empty response".to_string()));
        }

        Ok(text.to_string())
    }
}
