//! Job lifecycle: records, statuses, persistence, and the orchestrator.

mod orchestrator;
mod record;
mod status;
mod store;

pub use orchestrator::{JobSubmission, Orchestrator, MIN_PROMPT_CHARS};
pub use record::{GenerationJob, GenerationRequest, JobId, StageRecord};
pub use status::{JobStatus, StageState};
pub use store::{InMemoryJobStore, JobMutation, JobStore};
