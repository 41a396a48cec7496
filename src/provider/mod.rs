//! AI provider boundary: completion and embedding capabilities
//!
//! The pipeline never talks to the upstream service directly; everything
//! goes through the [`AiProvider`] trait so callers can swap the concrete
//! HTTP client for a stub in tests.

mod http;

pub use http::HttpAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// AI provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result alias for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Parameters for one completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Completion result: generated text plus token usage when the upstream reports it
#[derive(Debug, Clone)]
pub struct CompletionOutput {
    pub text: String,
    pub tokens_used: Option<u64>,
}

/// Completion and embedding capabilities of the external AI service
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generate a text completion for a prompt
    async fn completion(&self, request: CompletionRequest<'_>) -> ProviderResult<CompletionOutput>;

    /// Embed a batch of texts, one vector per input
    async fn embedding(&self, texts: &[String], model: &str) -> ProviderResult<Vec<Vec<f32>>>;
}

/// AI provider client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the AI service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (read from env AI_RELIABILITY_API_KEY if not set)
    /// Never serialized back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Default completion model
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Default embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_base_url() -> String { "http://localhost:8080".to_string() }
fn default_completion_model() -> String { "text-default".to_string() }
fn default_embedding_model() -> String { "embed-default".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            completion_model: default_completion_model(),
            embedding_model: default_embedding_model(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration overrides from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AI_RELIABILITY_BASE_URL") {
            self.base_url = val;
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_API_KEY") {
            self.api_key = Some(val);
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_COMPLETION_MODEL") {
            self.completion_model = val;
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_EMBEDDING_MODEL") {
            self.embedding_model = val;
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_PROVIDER_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.timeout_ms = ms;
            }
        }

        self
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
