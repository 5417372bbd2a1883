use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod extract;
pub mod gemini;
pub mod groq;
pub mod router;

pub use router::{FailoverPolicy, RetryPolicy, Route, Router, RouterError};

/// Configuration for a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
            model: None,
            timeout_secs: None,
        }
    }
}

/// Main trait that all LLM providers must implement.
///
/// A provider takes a system/user prompt pair and returns the raw response
/// text. JSON extraction happens above this trait, in the router, so every
/// provider stays a thin HTTP shim.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Send one prompt pair and return the raw completion text
    async fn call(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Error types for providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider returned no content")]
    EmptyResponse,
}
