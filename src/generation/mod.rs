//! Content Generation
//!
//! Request model, prompt construction and the language-model provider seam
//! used to produce posts, replies and threads.

pub mod openai;
pub mod prompt;
pub mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::usage::GenerationKind;

pub use openai::{GeneratorConfig, OpenAiGenerator};
pub use service::{GeneratedContent, GenerationService};

/// Longest prompt accepted, in characters
pub const MAX_PROMPT_CHARS: usize = 2000;
/// Thread length used when the request does not specify one
pub const DEFAULT_THREAD_LENGTH: u8 = 5;
/// Allowed thread lengths
pub const THREAD_LENGTH_RANGE: std::ops::RangeInclusive<u8> = 2..=10;

/// Error types for the language-model provider
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Transport-level failure (connect, timeout, decode)
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the provider
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered 2xx with a body that is not a completions response
    #[error("provider returned an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The provider answered without any usable text
    #[error("provider returned no content")]
    EmptyResponse,

    /// No API key configured
    #[error("generation provider is not configured")]
    NotConfigured,
}

/// A user's generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// What the content should be about (or the post being replied to)
    pub prompt: String,

    /// Kind of content to produce
    #[serde(default = "default_kind")]
    pub kind: GenerationKind,

    /// Optional voice, e.g. "witty" or "professional"
    #[serde(default)]
    pub tone: Option<String>,

    /// Number of parts for threads
    #[serde(default)]
    pub thread_length: Option<u8>,
}

fn default_kind() -> GenerationKind {
    GenerationKind::Generate
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, kind: GenerationKind) -> Self {
        Self {
            prompt: prompt.into(),
            kind,
            tone: None,
            thread_length: None,
        }
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn with_thread_length(mut self, length: u8) -> Self {
        self.thread_length = Some(length);
        self
    }

    /// Reject requests that should never reach the provider
    pub fn validate(&self) -> Result<(), CoreError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::InvalidRequest("prompt must not be empty".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(CoreError::InvalidRequest(format!(
                "prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        if let Some(length) = self.thread_length {
            if self.kind != GenerationKind::Thread {
                return Err(CoreError::InvalidRequest(
                    "thread_length only applies to threads".to_string(),
                ));
            }
            if !THREAD_LENGTH_RANGE.contains(&length) {
                return Err(CoreError::InvalidRequest(format!(
                    "thread_length must be between {} and {}",
                    THREAD_LENGTH_RANGE.start(),
                    THREAD_LENGTH_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    /// Thread length after applying the default
    pub fn effective_thread_length(&self) -> u8 {
        self.thread_length.unwrap_or(DEFAULT_THREAD_LENGTH)
    }
}

/// Language-model provider
#[async_trait]
pub trait ContentGenerator: Send + Sync + std::fmt::Debug {
    /// Produce the text for a validated request
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;
}
