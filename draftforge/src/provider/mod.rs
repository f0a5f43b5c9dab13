//! Text-generation providers.
//!
//! Each pipeline stage is bound to a provider kind and model by configuration
//! data, never by code. [`TextProvider`] is the single seam the stages see;
//! [`ProviderFactory`] turns configuration into live providers and is where
//! missing credentials surface, before any stage runs.

mod http;

pub use http::{GeminiProvider, HttpProviderFactory, OpenAiCompatProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::errors::GenerationError;

/// The provider families a stage can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// Google Gemini.
    Gemini,
    /// Perplexity's search-grounded models (OpenAI-compatible API).
    Perplexity,
    /// Anthropic models, routed through an OpenAI-compatible gateway.
    Claude,
}

impl ProviderKind {
    /// The default model used when configuration does not name one.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
            Self::Perplexity => "llama-3.1-sonar-small-128k-online",
            Self::Claude => "claude-3-5-sonnet-20241022",
        }
    }

    /// The environment variable holding this provider's credential.
    #[must_use]
    pub const fn credential_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
            Self::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Perplexity => write!(f, "perplexity"),
            Self::Claude => write!(f, "claude"),
        }
    }
}

/// A failure while calling a provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request exceeded its deadline.
    #[error("provider request timed out")]
    Timeout,

    /// The provider returned a non-success HTTP status.
    #[error("provider returned {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The request never reached the provider.
    #[error("network error: {0}")]
    Network(String),

    /// A success response whose payload could not be interpreted.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// One generation request, provider-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// System prompt, when the stage uses one.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Output token ceiling.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ProviderRequest {
    /// Creates a request with the stage defaults.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the output token ceiling.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A text-generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Which provider family this is.
    fn kind(&self) -> ProviderKind;

    /// Generates a completion for the request.
    async fn generate(&self, request: &ProviderRequest) -> Result<String, ProviderError>;
}

/// Source of provider credentials.
pub trait CredentialStore: Send + Sync {
    /// The credential for a provider, if configured.
    fn credential(&self, kind: ProviderKind) -> Option<String>;
}

/// Reads credentials from process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn credential(&self, kind: ProviderKind) -> Option<String> {
        std::env::var(kind.credential_var())
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// Builds live providers from configuration.
///
/// Creation fails with [`GenerationError::CredentialMissing`] when the
/// provider's credential is absent, so misconfiguration is caught before the
/// first stage starts.
pub trait ProviderFactory: Send + Sync {
    /// Creates a provider of the given kind bound to a model.
    fn create(
        &self,
        kind: ProviderKind,
        model: &str,
    ) -> Result<Arc<dyn TextProvider>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_display_matches_serde() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Perplexity,
            ProviderKind::Claude,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_request_builder() {
        let request = ProviderRequest::new("write")
            .with_system("you are terse")
            .with_max_tokens(128)
            .with_temperature(0.2);
        assert_eq!(request.system.as_deref(), Some("you are terse"));
        assert_eq!(request.max_tokens, 128);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Http {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned 429: rate limited");
    }
}
