//! Error types for the draftforge pipeline.
//!
//! The taxonomy distinguishes synchronous precondition failures (validation,
//! missing credentials, unresolvable references), which are returned from
//! `submit` before any job exists, from asynchronous failures (provider
//! errors), which surface through the job snapshot as `Failed`.

use thiserror::Error;

use crate::job::JobId;
use crate::provider::ProviderError;

/// The main error type for generation operations.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Bad caller input. Never retried automatically.
    #[error("validation error: {0}")]
    Validation(String),

    /// No active credential exists for a configured provider.
    #[error("no active credential for provider '{provider}'")]
    CredentialMissing {
        /// The provider the credential was looked up for.
        provider: String,
    },

    /// A referenced style profile or layout template did not resolve.
    #[error("{kind} '{id}' not found or inactive")]
    DependencyNotFound {
        /// What kind of reference failed to resolve.
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A text-generation provider call failed or timed out.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// An illegal job state transition was attempted.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The requested job does not exist.
    #[error("job '{0}' not found")]
    NotFound(JobId),

    /// The persistence layer rejected a write.
    #[error("store error: {0}")]
    Store(String),
}

impl GenerationError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a missing-credential error for a provider.
    #[must_use]
    pub fn credential_missing(provider: impl Into<String>) -> Self {
        Self::CredentialMissing {
            provider: provider.into(),
        }
    }

    /// Creates a dependency-not-found error.
    #[must_use]
    pub fn dependency_not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::DependencyNotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true if the error is a precondition failure that should be
    /// surfaced synchronously from `submit` (no job is created).
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::CredentialMissing { .. } | Self::DependencyNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenerationError::validation("prompt too short");
        assert_eq!(err.to_string(), "validation error: prompt too short");

        let err = GenerationError::credential_missing("openai");
        assert_eq!(err.to_string(), "no active credential for provider 'openai'");

        let err = GenerationError::dependency_not_found("style profile", "sp-1");
        assert_eq!(err.to_string(), "style profile 'sp-1' not found or inactive");
    }

    #[test]
    fn test_is_precondition() {
        assert!(GenerationError::validation("x").is_precondition());
        assert!(GenerationError::credential_missing("gemini").is_precondition());
        assert!(!GenerationError::InvalidState("terminal".to_string()).is_precondition());
    }
}
