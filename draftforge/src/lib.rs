//! # Draftforge
//!
//! A staged content-generation pipeline with web source harvesting.
//!
//! Draftforge turns a short prompt into a finished long-form article by
//! driving four ordered stages (Opener → Researcher → Writer → Editor), each
//! backed by a configurable external text-generation provider, optionally
//! seeded with material harvested from blog platforms:
//!
//! - **Job orchestration**: non-blocking submission, polled status snapshots,
//!   cooperative cancellation with race-safe terminal writes
//! - **Source fetching**: interchangeable URL-to-text strategies with
//!   browser-render → reader fallback chains
//! - **Text heuristics**: platform-noise cleaning, main-content extraction,
//!   token estimation, and model-safe chunking
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use draftforge::prelude::*;
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(HttpProviderFactory::new(Arc::new(EnvCredentialStore))),
//!     resolver,
//!     Arc::new(GenerationPipeline::new(Arc::new(FetchDispatcher::with_defaults()))),
//! );
//!
//! let receipt = orchestrator.submit(GenerationRequest::new("topic: rust in 2026"))?;
//! let snapshot = orchestrator.get_status(receipt.id)?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod errors;
pub mod fetch;
pub mod job;
pub mod observability;
pub mod pipeline;
pub mod provider;
pub mod testing;
pub mod text;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::GenerationError;
    pub use crate::fetch::{FetchDispatcher, FetchMethod, FetchResult, FetchStrategy};
    pub use crate::job::{
        GenerationJob, GenerationRequest, InMemoryJobStore, JobId, JobStatus, JobStore,
        JobSubmission, Orchestrator, StageRecord, StageState,
    };
    pub use crate::pipeline::{
        Article, GenerationPipeline, InstructionResolver, StageBinding, StageId, StageProviders,
    };
    pub use crate::provider::{
        CredentialStore, EnvCredentialStore, HttpProviderFactory, ProviderError, ProviderFactory,
        ProviderKind, TextProvider,
    };
}
