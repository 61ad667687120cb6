//! OpenAI-compatible Chat Completions Provider
//!
//! Sends one `POST {api_base}/chat/completions` per generation and returns
//! the first choice's message text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::prompt::{build_prompt, Prompt};
use super::{ContentGenerator, GenerationRequest, GeneratorError};

/// Language-model provider configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Bearer token; usually supplied through the environment
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Completion token cap
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 600,
            temperature: 0.8,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    /// Build a client with the configured timeout
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

/// Extract the first non-empty choice from a completions response body
fn parse_completion(body: &str) -> Result<String, GeneratorError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(GeneratorError::Decode)?;
    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
        .ok_or(GeneratorError::EmptyResponse)
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(GeneratorError::NotConfigured)?;

        let prompt = build_prompt(request);
        let url = self.config.completions_url();
        debug!(url = %url, model = %self.config.model, kind = %request.kind, "Calling generation provider");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(&prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }
}
