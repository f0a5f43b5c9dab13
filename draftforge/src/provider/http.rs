//! HTTP-backed provider implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    CredentialStore, ProviderError, ProviderFactory, ProviderKind, ProviderRequest, TextProvider,
};
use crate::errors::GenerationError;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const PERPLEXITY_BASE: &str = "https://api.perplexity.ai";
const CLAUDE_COMPAT_BASE: &str = "https://api.anthropic.com/v1";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation can take minutes for long articles.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);
/// Error bodies are truncated to this length before logging.
const ERROR_BODY_LIMIT: usize = 500;

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(GENERATION_TIMEOUT)
        .build()
        .unwrap_or_default()
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        body.to_string()
    } else {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

// -- OpenAI-compatible chat completions ------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// A provider speaking the OpenAI chat-completions protocol.
///
/// Covers OpenAI itself, Perplexity, and Anthropic's compatibility endpoint,
/// differing only in base URL and credential.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    kind: ProviderKind,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatProvider {
    /// Creates a provider against the OpenAI API.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(ProviderKind::OpenAi, OPENAI_BASE, api_key, model)
    }

    /// Creates a provider against the Perplexity API.
    #[must_use]
    pub fn perplexity(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(ProviderKind::Perplexity, PERPLEXITY_BASE, api_key, model)
    }

    /// Creates a provider against Anthropic's OpenAI-compatible endpoint.
    #[must_use]
    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(ProviderKind::Claude, CLAUDE_COMPAT_BASE, api_key, model)
    }

    /// Creates a provider against an arbitrary compatible endpoint (tests).
    #[must_use]
    pub fn with_base_url(
        kind: ProviderKind,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: http_client(),
            kind,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("no completion in response".to_string()))
    }
}

// -- Gemini ----------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// A provider against the Gemini `generateContent` API.
///
/// Gemini has no separate system role at this endpoint, so the system prompt
/// is prepended to the user prompt.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    /// Creates a Gemini provider.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(GEMINI_BASE, api_key, model)
    }

    /// Creates a Gemini provider against an arbitrary endpoint (tests).
    #[must_use]
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let full_prompt = match &request.system {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: &full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no candidate text in response".to_string(),
            ));
        }
        Ok(text)
    }
}

// -- Factory ---------------------------------------------------------------

/// Builds HTTP providers, resolving credentials through a [`CredentialStore`].
pub struct HttpProviderFactory {
    credentials: Arc<dyn CredentialStore>,
}

impl HttpProviderFactory {
    /// Creates a factory over a credential store.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        model: &str,
    ) -> Result<Arc<dyn TextProvider>, GenerationError> {
        let key = self
            .credentials
            .credential(kind)
            .ok_or_else(|| GenerationError::credential_missing(kind.to_string()))?;
        let provider: Arc<dyn TextProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiCompatProvider::openai(key, model)),
            ProviderKind::Perplexity => Arc::new(OpenAiCompatProvider::perplexity(key, model)),
            ProviderKind::Claude => Arc::new(OpenAiCompatProvider::claude(key, model)),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(key, model)),
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct NoCredentials;
    impl CredentialStore for NoCredentials {
        fn credential(&self, _kind: ProviderKind) -> Option<String> {
            None
        }
    }

    struct StaticCredentials;
    impl CredentialStore for StaticCredentials {
        fn credential(&self, _kind: ProviderKind) -> Option<String> {
            Some("test-key".to_string())
        }
    }

    #[test]
    fn test_factory_rejects_missing_credential() {
        let factory = HttpProviderFactory::new(Arc::new(NoCredentials));
        let err = factory
            .create(ProviderKind::Gemini, "gemini-1.5-flash")
            .err()
            .map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("no active credential for provider 'gemini'")
        );
    }

    #[test]
    fn test_factory_builds_each_kind() {
        let factory = HttpProviderFactory::new(Arc::new(StaticCredentials));
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Perplexity,
            ProviderKind::Claude,
        ] {
            let provider = factory.create(kind, kind.default_model()).unwrap();
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "가".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= ERROR_BODY_LIMIT + 3);
    }

    #[test]
    fn test_chat_request_serialization() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 16,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 16);
    }
}
