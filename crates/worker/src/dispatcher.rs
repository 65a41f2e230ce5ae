//! Queued-job dispatcher.
//!
//! Polls for queued jobs every `poll_interval` and hands each one to the
//! orchestrator on its own task. The claim itself is the conditional
//! QUEUED → PROCESSING write inside `Orchestrator::process`, so two
//! dispatcher instances polling the same store cannot double-run a job —
//! the loser sees a conflict and drops the job silently.

use std::sync::Arc;
use std::time::Duration;

use relight_cloud::{KeyStrategy, ObjectRef};
use relight_core::{CoreError, JobStatus};
use relight_db::RepoError;
use relight_pipeline::{JobService, Orchestrator, PipelineError, ServiceError};
use tokio_util::sync::CancellationToken;

/// Long-lived task that feeds queued jobs into the pipeline.
pub struct JobDispatcher {
    service: JobService,
    orchestrator: Arc<Orchestrator>,
    keys: KeyStrategy,
    upload_bucket: String,
    poll_interval: Duration,
    dispatch_limit: u32,
}

impl JobDispatcher {
    pub fn new(
        service: JobService,
        orchestrator: Arc<Orchestrator>,
        upload_bucket: String,
        poll_interval: Duration,
        dispatch_limit: u32,
    ) -> Self {
        Self {
            service,
            orchestrator,
            keys: KeyStrategy::new(),
            upload_bucket,
            poll_interval,
            dispatch_limit,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            dispatch_limit = self.dispatch_limit,
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_cycle().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }

    /// One dispatch cycle: pick up queued jobs and spawn a pipeline run
    /// for each.
    async fn dispatch_cycle(&self) -> Result<(), ServiceError> {
        let queued = self.service.find_queued(self.dispatch_limit).await?;

        for job in queued {
            let uploaded = ObjectRef::new(
                &self.upload_bucket,
                self.keys.upload_key(&job.user_id, job.job_id, &job.file_name),
            );
            let orchestrator = Arc::clone(&self.orchestrator);

            tokio::spawn(async move {
                let job_id = job.job_id;
                match orchestrator.process(job, uploaded).await {
                    Ok(completed) => {
                        tracing::debug!(
                            job_id = %job_id,
                            status = %completed.status,
                            "Pipeline run finished"
                        );
                    }
                    Err(PipelineError::Service(err)) if lost_claim(&err) => {
                        tracing::debug!(job_id = %job_id, "Job claimed by another worker");
                    }
                    Err(err) => {
                        tracing::error!(job_id = %job_id, error = %err, "Pipeline run failed");
                    }
                }
            });
        }

        Ok(())
    }
}

/// Whether a claim failure means another worker got there first.
fn lost_claim(err: &ServiceError) -> bool {
    match err {
        ServiceError::Repo(RepoError::Conflict(_)) => true,
        ServiceError::Domain(CoreError::InvalidTransition {
            to: JobStatus::Processing,
            ..
        }) => true,
        _ => false,
    }
}
