//! The job persistence contract and its in-memory implementation.

use dashmap::DashMap;

use super::record::{GenerationJob, JobId};
use super::status::JobStatus;
use crate::errors::GenerationError;
use crate::pipeline::Article;

/// A mutation applied to a job under the store's per-job lock.
pub type JobMutation<'a> = Box<dyn FnOnce(&mut GenerationJob) + Send + 'a>;

/// Persistence for jobs and finished articles.
///
/// `update_guarded` is the single write path for job state after creation:
/// the mutation runs only while the job's current status is in `expected`,
/// atomically per job id. This is what lets a cancel racing an in-flight
/// completion win: the completion's guarded write observes `Cancelled`,
/// which is not in its expected set, and becomes a no-op.
pub trait JobStore: Send + Sync {
    /// Persists a newly created job.
    fn insert(&self, job: GenerationJob) -> Result<(), GenerationError>;

    /// A point-in-time snapshot of a job.
    fn get(&self, id: JobId) -> Result<GenerationJob, GenerationError>;

    /// Applies `mutate` iff the job's status is in `expected`.
    ///
    /// Returns `Ok(true)` when the mutation ran, `Ok(false)` when the guard
    /// rejected it, `Err(NotFound)` for an unknown id.
    fn update_guarded(
        &self,
        id: JobId,
        expected: &[JobStatus],
        mutate: JobMutation<'_>,
    ) -> Result<bool, GenerationError>;

    /// Persists a finished article, rejecting duplicate slugs.
    fn insert_article(&self, article: &Article) -> Result<(), GenerationError>;
}

/// In-memory store over concurrent maps. The default for tests and
/// single-process deployments.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, GenerationJob>,
    articles: DashMap<String, Article>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of stored articles.
    #[must_use]
    pub fn article_count(&self) -> usize {
        self.articles.len()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: GenerationJob) -> Result<(), GenerationError> {
        let id = job.id;
        if self.jobs.insert(id, job).is_some() {
            return Err(GenerationError::Store(format!("duplicate job id '{id}'")));
        }
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<GenerationJob, GenerationError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(GenerationError::NotFound(id))
    }

    fn update_guarded(
        &self,
        id: JobId,
        expected: &[JobStatus],
        mutate: JobMutation<'_>,
    ) -> Result<bool, GenerationError> {
        // get_mut holds the shard lock for the whole check-then-write.
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Err(GenerationError::NotFound(id));
        };
        if !expected.contains(&entry.status) {
            return Ok(false);
        }
        mutate(entry.value_mut());
        Ok(true)
    }

    fn insert_article(&self, article: &Article) -> Result<(), GenerationError> {
        use dashmap::mapref::entry::Entry;
        match self.articles.entry(article.slug.clone()) {
            Entry::Occupied(_) => Err(GenerationError::Store(format!(
                "duplicate slug '{}'",
                article.slug
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(article.clone());
                Ok(())
            }
        }
    }
}
