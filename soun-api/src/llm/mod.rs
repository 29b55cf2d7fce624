//! Language model access
//!
//! Handlers and services talk to a `LanguageModel`. Production wires in
//! `OpenAiClient`; with no API key configured the service runs on
//! `DisabledModel` and every feature with a fallback still works.

pub mod json;
pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

/// Language model errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model is not configured")]
    NotConfigured,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the provider
    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Output parsed but failed shape validation
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

impl LlmError {
    /// 429, 5xx and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Status(status, _) => *status == 429 || (500..=599).contains(status),
            LlmError::Timeout(_) | LlmError::Connect(_) => true,
            _ => false,
        }
    }
}

/// A chat-completion style model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a single system + user exchange, returning the assistant text
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Model identifier for logging
    fn name(&self) -> &str;
}

/// Stand-in used when no API key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
