//! Job service and orchestrator for the relight pipeline.
//!
//! [`JobService`] is the only writer of job and batch state: every
//! mutation validates the requested status transition in memory before
//! issuing a conditional persistence write. [`Orchestrator`] drives one
//! uploaded image through optimize → analyze → edit → finalize →
//! notify → batch progress, with the fallback policy that keeps
//! provider outages from failing jobs.

pub mod orchestrator;
pub mod service;

pub use orchestrator::{Orchestrator, PipelineConfig, PipelineError};
pub use service::{JobService, ServiceError};
