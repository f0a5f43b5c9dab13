//! Job and stage records: the persisted view of one generation request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::status::{JobStatus, StageState};
use crate::pipeline::{Article, StageId, StageProviders};

/// Opaque job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A generation request as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-form prompt text.
    pub prompt: String,
    /// Optional title hint.
    pub title: Option<String>,
    /// Target locale, e.g. `ko` or `en`.
    pub locale: String,
    /// Tags attached to the finished article.
    pub tags: Vec<String>,
    /// Optional style-profile reference.
    pub style_profile_id: Option<String>,
    /// Optional layout-template reference.
    pub layout_id: Option<String>,
    /// Reference URLs harvested during research.
    pub reference_urls: Vec<String>,
    /// Per-stage provider bindings.
    pub providers: StageProviders,
}

impl GenerationRequest {
    /// Creates a request with defaults for everything but the prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            title: None,
            locale: "ko".to_string(),
            tags: Vec::new(),
            style_profile_id: None,
            layout_id: None,
            reference_urls: Vec::new(),
            providers: StageProviders::default(),
        }
    }

    /// Sets the title hint.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the style-profile reference.
    #[must_use]
    pub fn with_style_profile(mut self, id: impl Into<String>) -> Self {
        self.style_profile_id = Some(id.into());
        self
    }

    /// Sets the layout-template reference.
    #[must_use]
    pub fn with_layout(mut self, id: impl Into<String>) -> Self {
        self.layout_id = Some(id.into());
        self
    }

    /// Sets the reference URLs.
    #[must_use]
    pub fn with_reference_urls(mut self, urls: Vec<String>) -> Self {
        self.reference_urls = urls;
        self
    }

    /// Sets the stage-provider bindings.
    #[must_use]
    pub fn with_providers(mut self, providers: StageProviders) -> Self {
        self.providers = providers;
        self
    }
}

/// Per-stage status line on a job. Created once, mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Which stage this records.
    pub stage: StageId,
    /// Human-readable stage name.
    pub display_name: String,
    /// One-line stage description.
    pub description: String,
    /// Current state.
    pub status: StageState,
    /// When the stage started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage completed or failed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Short summary on success; the verbatim error on failure.
    pub output: Option<String>,
}

impl StageRecord {
    fn new(stage: StageId) -> Self {
        Self {
            stage,
            display_name: stage.display_name().to_string(),
            description: stage.description().to_string(),
            status: StageState::Pending,
            started_at: None,
            completed_at: None,
            output: None,
        }
    }

    pub(super) fn start(&mut self) {
        self.status = StageState::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub(super) fn complete(&mut self, summary: impl Into<String>) {
        self.status = StageState::Completed;
        self.completed_at = Some(Utc::now());
        self.output = Some(summary.into());
    }

    pub(super) fn fail(&mut self, error: impl Into<String>) {
        self.status = StageState::Failed;
        self.completed_at = Some(Utc::now());
        self.output = Some(error.into());
    }
}

/// One generation request and its tracked lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Job identity.
    pub id: JobId,
    /// The request that created the job.
    pub request: GenerationRequest,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Completion percentage, 0-100, monotone while processing.
    pub progress: u8,
    /// Human-readable current step label.
    pub current_step: String,
    /// Fixed stage list, one record per pipeline stage.
    pub stages: Vec<StageRecord>,
    /// Failure description when status is failed.
    pub error_message: Option<String>,
    /// The finished article once completed.
    pub article: Option<Article>,
    /// Wall-clock processing time once terminal.
    pub processing_seconds: Option<f64>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When processing began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// Creates a pending job with the fixed stage list.
    #[must_use]
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "queued".to_string(),
            stages: StageId::ALL.into_iter().map(StageRecord::new).collect(),
            error_message: None,
            article: None,
            processing_seconds: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Raises progress to `target`, never lowering it.
    pub fn advance_progress(&mut self, target: u8) {
        self.progress = self.progress.max(target.min(100));
    }

    /// Mutable access to one stage's record.
    pub fn stage_mut(&mut self, stage: StageId) -> &mut StageRecord {
        let index = self
            .stages
            .iter()
            .position(|r| r.stage == stage)
            .unwrap_or_else(|| unreachable!("fixed stage list covers all stages"));
        &mut self.stages[index]
    }

    /// Stamps the terminal timestamp and processing duration.
    pub(super) fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            let millis = now.signed_duration_since(started).num_milliseconds();
            #[allow(clippy::cast_precision_loss)]
            let seconds = millis.max(0) as f64 / 1000.0;
            self.processing_seconds = Some(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_job_shape() {
        let job = GenerationJob::new(GenerationRequest::new("topic: test prompt"));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.stages.len(), 4);
        assert!(job.stages.iter().all(|s| s.status == StageState::Pending));
        assert!(job.article.is_none());
    }

    #[test]
    fn test_progress_is_monotone() {
        let mut job = GenerationJob::new(GenerationRequest::new("p"));
        job.advance_progress(35);
        job.advance_progress(10);
        assert_eq!(job.progress, 35);
        job.advance_progress(120);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_stage_record_transitions() {
        let mut job = GenerationJob::new(GenerationRequest::new("p"));
        job.stage_mut(StageId::Opener).start();
        assert_eq!(job.stage_mut(StageId::Opener).status, StageState::InProgress);
        job.stage_mut(StageId::Opener).complete("done");
        let record = job.stage_mut(StageId::Opener);
        assert_eq!(record.status, StageState::Completed);
        assert_eq!(record.output.as_deref(), Some("done"));
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("prompt text here")
            .with_title("A Title")
            .with_locale("en")
            .with_tags(vec!["t".to_string()]);
        assert_eq!(request.title.as_deref(), Some("A Title"));
        assert_eq!(request.locale, "en");
    }
}
