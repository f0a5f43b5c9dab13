//! Hand-rolled test doubles for the provider and resolver seams.
//!
//! Used by the crate's own tests and available to downstream integration
//! tests. The scripted provider replays a shared queue of responses in call
//! order, which maps one-to-one onto the sequential stage order.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::GenerationError;
use crate::pipeline::{InstructionResolver, ResolvedInstruction};
use crate::provider::{
    CredentialStore, ProviderError, ProviderFactory, ProviderKind, ProviderRequest, TextProvider,
};

/// A shared script of provider responses, consumed across all providers a
/// [`ScriptedProviderFactory`] creates, in call order.
#[derive(Default)]
pub struct ProviderScript {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ProviderScript {
    /// Creates an empty script. With no queued responses every call returns
    /// a fixed placeholder completion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses.lock().push_back(Ok(response.into()));
    }

    /// Queues a failure.
    pub fn push_err(&self, error: ProviderError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Makes every subsequent call block until [`Self::release_calls`].
    pub fn block_calls(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Releases up to `count` blocked or future calls.
    pub fn release_calls(&self, count: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Every request seen so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    async fn next(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted response".to_string()))
    }
}

struct ScriptedProvider {
    kind: ProviderKind,
    script: Arc<ProviderScript>,
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        self.script.next(request).await
    }
}

/// A factory whose providers all replay one shared [`ProviderScript`].
pub struct ScriptedProviderFactory {
    script: Arc<ProviderScript>,
}

impl ScriptedProviderFactory {
    /// Creates a factory over a script.
    #[must_use]
    pub fn new(script: Arc<ProviderScript>) -> Self {
        Self { script }
    }
}

impl ProviderFactory for ScriptedProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        _model: &str,
    ) -> Result<Arc<dyn TextProvider>, GenerationError> {
        Ok(Arc::new(ScriptedProvider {
            kind,
            script: Arc::clone(&self.script),
        }))
    }
}

/// A credential store with no credentials at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCredentials;

impl CredentialStore for EmptyCredentials {
    fn credential(&self, _kind: ProviderKind) -> Option<String> {
        None
    }
}

/// An instruction resolver backed by fixed maps.
#[derive(Default)]
pub struct StaticResolver {
    styles: HashMap<String, ResolvedInstruction>,
    layouts: HashMap<String, ResolvedInstruction>,
}

impl StaticResolver {
    /// Registers a style profile.
    #[must_use]
    pub fn with_style(mut self, id: impl Into<String>, instruction: impl Into<String>, active: bool) -> Self {
        self.styles.insert(
            id.into(),
            ResolvedInstruction {
                instruction: instruction.into(),
                active,
            },
        );
        self
    }

    /// Registers a layout template.
    #[must_use]
    pub fn with_layout(mut self, id: impl Into<String>, instruction: impl Into<String>, active: bool) -> Self {
        self.layouts.insert(
            id.into(),
            ResolvedInstruction {
                instruction: instruction.into(),
                active,
            },
        );
        self
    }
}

impl InstructionResolver for StaticResolver {
    fn resolve_style(&self, id: &str) -> Result<Option<ResolvedInstruction>, GenerationError> {
        Ok(self.styles.get(id).cloned())
    }

    fn resolve_layout(&self, id: &str) -> Result<Option<ResolvedInstruction>, GenerationError> {
        Ok(self.layouts.get(id).cloned())
    }
}
