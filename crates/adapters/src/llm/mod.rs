//! LLM backend adapters

pub mod ollama;
pub mod openai;
pub mod stub;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use stub::StubLlm;

use serde::{Deserialize, Serialize};

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Temperature (0.0-1.0)
    pub temperature: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            max_output_tokens: 700,
            timeout_secs: 15,
        }
    }
}

impl LlmConfig {
    pub fn with_model(model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            model: model.into(),
            timeout_secs,
            ..Default::default()
        }
    }
}

/// Join a base URL and an absolute path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("http://localhost:11434/", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            endpoint("https://api.openai.com", "/v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
