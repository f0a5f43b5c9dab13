//! The job orchestrator: request intake, lifecycle ownership, and the single
//! authoritative write path for job state.
//!
//! `submit` validates synchronously and hands execution to a background task;
//! all further progress is observed by polling `get_status`. Every write after
//! creation goes through the store's guarded update keyed on the expected
//! prior status, so a cancel racing the pipeline's own completion cannot be
//! silently overwritten.

use chrono::Utc;
use std::sync::Arc;

use super::record::{GenerationJob, GenerationRequest, JobId};
use super::status::JobStatus;
use super::store::JobStore;
use crate::errors::GenerationError;
use crate::pipeline::{
    GenerationPipeline, InstructionResolver, PromptSpec, ResolvedInstruction, StageContext,
    StageId, StageProviderSet,
};
use crate::provider::ProviderFactory;

/// Minimum prompt length in characters, after trimming.
pub const MIN_PROMPT_CHARS: usize = 10;

/// Receipt for an accepted job, returned by [`Orchestrator::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSubmission {
    /// The new job's id.
    pub id: JobId,
    /// Status at the moment of submission; always [`JobStatus::Pending`], the
    /// background task flips it to `Processing` after the caller returns.
    pub status: JobStatus,
}

/// Progress stamped when processing begins.
const PROGRESS_START: u8 = 5;
/// Progress stamped while the finished article is being persisted.
const PROGRESS_PERSISTING: u8 = 95;

/// Owns generation-job lifecycles.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    factory: Arc<dyn ProviderFactory>,
    resolver: Arc<dyn InstructionResolver>,
    pipeline: Arc<GenerationPipeline>,
}

impl Orchestrator {
    /// Creates an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        factory: Arc<dyn ProviderFactory>,
        resolver: Arc<dyn InstructionResolver>,
        pipeline: Arc<GenerationPipeline>,
    ) -> Self {
        Self {
            store,
            factory,
            resolver,
            pipeline,
        }
    }

    /// Validates a request, persists the pending job, and schedules pipeline
    /// execution without blocking.
    ///
    /// Fails synchronously on validation and precondition errors (short
    /// prompt, unresolvable style/layout reference, missing provider
    /// credential); in those cases no job is created. Everything after the
    /// returned receipt is observed via [`Self::get_status`].
    pub fn submit(&self, request: GenerationRequest) -> Result<JobSubmission, GenerationError> {
        if request.prompt.trim().chars().count() < MIN_PROMPT_CHARS {
            return Err(GenerationError::validation(format!(
                "prompt must be at least {MIN_PROMPT_CHARS} characters"
            )));
        }

        let style_instruction = match &request.style_profile_id {
            Some(id) => Some(require_active(
                self.resolver.resolve_style(id)?,
                "style profile",
                id,
            )?),
            None => None,
        };
        let layout_instruction = match &request.layout_id {
            Some(id) => Some(require_active(
                self.resolver.resolve_layout(id)?,
                "layout template",
                id,
            )?),
            None => None,
        };

        // Resolving providers up front surfaces missing credentials before
        // any job or stage record exists.
        let providers = StageProviderSet::resolve(self.factory.as_ref(), &request.providers)?;

        let spec = PromptSpec::parse(&request.prompt, request.title.as_deref(), &request.tags);
        let mut ctx = StageContext::new(spec, request.locale.clone());
        ctx.tags = request.tags.clone();
        ctx.title_hint = request.title.clone();
        ctx.style_instruction = style_instruction;
        ctx.layout_instruction = layout_instruction;
        ctx.reference_urls = request.reference_urls.clone();

        let job = GenerationJob::new(request);
        let id = job.id;
        let status = job.status;
        self.store.insert(job)?;
        tracing::info!(job = %id, "job submitted");

        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            run_job(store, pipeline, id, providers, ctx).await;
        });

        Ok(JobSubmission { id, status })
    }

    /// A point-in-time snapshot of the job.
    pub fn get_status(&self, id: JobId) -> Result<GenerationJob, GenerationError> {
        self.store.get(id)
    }

    /// Cancels a pending or processing job.
    ///
    /// The terminal write is guarded on the current status, so an in-flight
    /// pipeline completion racing this call cannot resurrect the job.
    pub fn cancel(&self, id: JobId) -> Result<(), GenerationError> {
        let cancelled = self.store.update_guarded(
            id,
            &[JobStatus::Pending, JobStatus::Processing],
            Box::new(|job| {
                job.status = JobStatus::Cancelled;
                job.current_step = "cancelled".to_string();
                job.finish();
            }),
        )?;
        if cancelled {
            tracing::info!(job = %id, "job cancelled");
            Ok(())
        } else {
            Err(GenerationError::InvalidState(format!(
                "job '{id}' is already terminal"
            )))
        }
    }
}

fn require_active(
    resolved: Option<ResolvedInstruction>,
    kind: &'static str,
    id: &str,
) -> Result<String, GenerationError> {
    match resolved {
        Some(instruction) if instruction.active => Ok(instruction.instruction),
        _ => Err(GenerationError::dependency_not_found(kind, id.to_string())),
    }
}

/// Drives the pipeline for one job. Every state write is guarded on the
/// expected prior status; a guard rejection means a cancel won the race and
/// the task simply stops.
async fn run_job(
    store: Arc<dyn JobStore>,
    pipeline: Arc<GenerationPipeline>,
    id: JobId,
    providers: StageProviderSet,
    mut ctx: StageContext,
) {
    let started = store.update_guarded(
        id,
        &[JobStatus::Pending],
        Box::new(|job| {
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
            job.advance_progress(PROGRESS_START);
            job.current_step = "starting pipeline".to_string();
        }),
    );
    if !matches!(started, Ok(true)) {
        tracing::debug!(job = %id, "job no longer pending, not starting");
        return;
    }

    for stage in StageId::ALL {
        let entered = store.update_guarded(
            id,
            &[JobStatus::Processing],
            Box::new(move |job| {
                job.stage_mut(stage).start();
                job.advance_progress(stage.progress_at_start());
                job.current_step = stage.display_name().to_string();
            }),
        );
        if !matches!(entered, Ok(true)) {
            tracing::debug!(job = %id, %stage, "job no longer processing, stopping");
            return;
        }

        match pipeline.run_stage(stage, &providers, &mut ctx).await {
            Ok(summary) => {
                let recorded = store.update_guarded(
                    id,
                    &[JobStatus::Processing],
                    Box::new(move |job| {
                        job.stage_mut(stage).complete(summary);
                    }),
                );
                if !matches!(recorded, Ok(true)) {
                    tracing::debug!(job = %id, %stage, "completion write rejected, stopping");
                    return;
                }
            }
            Err(error) => {
                mark_failed(&store, id, Some(stage), &error.to_string());
                return;
            }
        }
    }

    let Some(article) = ctx.take_article() else {
        mark_failed(&store, id, None, "pipeline finished without an article");
        return;
    };

    let persisting = store.update_guarded(
        id,
        &[JobStatus::Processing],
        Box::new(|job| {
            job.advance_progress(PROGRESS_PERSISTING);
            job.current_step = "persisting article".to_string();
        }),
    );
    if !matches!(persisting, Ok(true)) {
        tracing::debug!(job = %id, "job no longer processing, discarding article");
        return;
    }

    if let Err(error) = store.insert_article(&article) {
        mark_failed(&store, id, None, &error.to_string());
        return;
    }

    let completed = store.update_guarded(
        id,
        &[JobStatus::Processing],
        Box::new(move |job| {
            job.article = Some(article);
            job.status = JobStatus::Completed;
            job.advance_progress(100);
            job.current_step = "completed".to_string();
            job.finish();
        }),
    );
    match completed {
        Ok(true) => tracing::info!(job = %id, "job completed"),
        Ok(false) => tracing::debug!(job = %id, "completion lost to a terminal write"),
        Err(error) => tracing::warn!(job = %id, %error, "completion write failed"),
    }
}

/// Best-effort terminal failure write; a rejected guard means a cancel
/// already made the job terminal.
fn mark_failed(store: &Arc<dyn JobStore>, id: JobId, stage: Option<StageId>, message: &str) {
    let message = message.to_string();
    let result = store.update_guarded(
        id,
        &[JobStatus::Processing],
        Box::new(move |job| {
            if let Some(stage) = stage {
                job.stage_mut(stage).fail(message.clone());
            }
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.current_step = "failed".to_string();
            job.finish();
        }),
    );
    match result {
        Ok(true) => tracing::warn!(job = %id, "job failed"),
        Ok(false) => tracing::debug!(job = %id, "failure write rejected, job already terminal"),
        Err(error) => tracing::warn!(job = %id, %error, "failure write errored"),
    }
}
