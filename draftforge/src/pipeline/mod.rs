//! The generation pipeline: four ordered stages turning a prompt into a
//! finished article.
//!
//! Stage order is fixed (Opener → Researcher → Writer → Editor); which
//! provider backs each stage is per-job data ([`config::StageProviders`]).
//! The pipeline itself is stateless across jobs; all per-job accumulation
//! lives in [`StageContext`], owned by the caller between stage calls so the
//! orchestrator can persist progress at every boundary.

pub mod article;
pub mod config;
pub mod quality;
mod stages;

pub use article::{Article, ArticleMetadata, FaqEntry};
pub use config::{
    InstructionResolver, PromptSpec, ResolvedInstruction, StageBinding, StageProviders, Tone,
};
pub use stages::{OpenerBrief, MAX_REVISION_ITERATIONS};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::GenerationError;
use crate::fetch::FetchDispatcher;
use crate::provider::{ProviderFactory, TextProvider};

/// The fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Topic and keyword analysis.
    Opener,
    /// Supporting-material research.
    Researcher,
    /// Full draft production.
    Writer,
    /// Review, revision loop, and metadata derivation.
    Editor,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Opener, Self::Researcher, Self::Writer, Self::Editor];

    /// Human-readable stage name for status displays.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Opener => "Opener",
            Self::Researcher => "Researcher",
            Self::Writer => "Writer",
            Self::Editor => "Editor",
        }
    }

    /// One-line description for status displays.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Opener => "Analyzes the topic, search intent, and keywords",
            Self::Researcher => "Gathers supporting facts, statistics, and sources",
            Self::Writer => "Writes the full draft from prompt and research",
            Self::Editor => "Reviews the draft and derives final metadata",
        }
    }

    /// Job progress percentage when this stage starts.
    #[must_use]
    pub const fn progress_at_start(self) -> u8 {
        match self {
            Self::Opener => 10,
            Self::Researcher => 35,
            Self::Writer => 60,
            Self::Editor => 85,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opener => write!(f, "opener"),
            Self::Researcher => write!(f, "researcher"),
            Self::Writer => write!(f, "writer"),
            Self::Editor => write!(f, "editor"),
        }
    }
}

/// Live providers resolved from a job's stage bindings.
///
/// Resolution happens at submission time, so a missing credential fails the
/// submit call instead of the first stage.
pub struct StageProviderSet {
    providers: HashMap<StageId, Arc<dyn TextProvider>>,
}

impl StageProviderSet {
    /// Resolves every stage binding through the factory.
    pub fn resolve(
        factory: &dyn ProviderFactory,
        config: &StageProviders,
    ) -> Result<Self, GenerationError> {
        let mut providers = HashMap::new();
        for stage in StageId::ALL {
            let binding = config.binding(stage);
            providers.insert(stage, factory.create(binding.kind, &binding.model)?);
        }
        Ok(Self { providers })
    }

    fn get(&self, stage: StageId) -> &dyn TextProvider {
        self.providers
            .get(&stage)
            .unwrap_or_else(|| unreachable!("all stages resolved at construction"))
            .as_ref()
    }
}

/// Per-job accumulation across stages.
///
/// The orchestrator owns the context between stage calls; stage handlers read
/// prior outputs from it and write their own.
pub struct StageContext {
    /// Parsed prompt fields.
    pub spec: PromptSpec,
    /// Request locale.
    pub locale: String,
    /// Caller-supplied tags.
    pub tags: Vec<String>,
    /// Optional title hint from the request.
    pub title_hint: Option<String>,
    /// Resolved style-profile instruction text.
    pub style_instruction: Option<String>,
    /// Resolved layout-template instruction text.
    pub layout_instruction: Option<String>,
    /// Reference URLs to harvest during research.
    pub reference_urls: Vec<String>,
    pub(crate) brief: Option<OpenerBrief>,
    pub(crate) research: Option<String>,
    pub(crate) draft: Option<String>,
    pub(crate) article: Option<Article>,
}

impl StageContext {
    /// Creates an empty context from request inputs.
    #[must_use]
    pub fn new(spec: PromptSpec, locale: impl Into<String>) -> Self {
        Self {
            spec,
            locale: locale.into(),
            tags: Vec::new(),
            title_hint: None,
            style_instruction: None,
            layout_instruction: None,
            reference_urls: Vec::new(),
            brief: None,
            research: None,
            draft: None,
            article: None,
        }
    }

    /// The finished article, available after the Editor stage succeeds.
    #[must_use]
    pub fn take_article(&mut self) -> Option<Article> {
        self.article.take()
    }
}

/// Executes stages against their bound providers.
pub struct GenerationPipeline {
    fetcher: Arc<FetchDispatcher>,
}

impl GenerationPipeline {
    /// Creates a pipeline over a fetch dispatcher.
    #[must_use]
    pub fn new(fetcher: Arc<FetchDispatcher>) -> Self {
        Self { fetcher }
    }

    /// Runs one stage, returning the stage-record summary.
    ///
    /// The caller drives stages strictly in [`StageId::ALL`] order; each
    /// stage reads its predecessors' output from the context.
    pub async fn run_stage(
        &self,
        stage: StageId,
        providers: &StageProviderSet,
        ctx: &mut StageContext,
    ) -> Result<String, GenerationError> {
        let started = Instant::now();
        tracing::debug!(%stage, provider = %providers.get(stage).kind(), "stage starting");

        let result = match stage {
            StageId::Opener => stages::run_opener(providers.get(stage), ctx).await,
            StageId::Researcher => {
                stages::run_researcher(providers.get(stage), &self.fetcher, ctx).await
            }
            StageId::Writer => stages::run_writer(providers.get(stage), ctx).await,
            StageId::Editor => {
                stages::run_editor(providers.get(stage), providers.get(StageId::Writer), ctx).await
            }
        };

        match &result {
            Ok(summary) => tracing::info!(
                %stage,
                elapsed_ms = started.elapsed().as_millis() as u64,
                summary = %summary,
                "stage completed"
            ),
            Err(error) => tracing::warn!(%stage, %error, "stage failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_order_and_progress_monotone() {
        let mut last = 0;
        for stage in StageId::ALL {
            assert!(stage.progress_at_start() > last);
            last = stage.progress_at_start();
        }
        assert!(last < 100);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(StageId::Opener.to_string(), "opener");
        assert_eq!(StageId::Editor.display_name(), "Editor");
    }

    #[test]
    fn test_context_take_article_once() {
        let spec = PromptSpec::parse("topic: t", None, &[]);
        let mut ctx = StageContext::new(spec, "ko");
        assert!(ctx.take_article().is_none());
    }
}
