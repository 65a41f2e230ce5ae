//! Drives one uploaded image through the full pipeline.
//!
//! Collaborators (blob store, fetcher, providers, notifier) are
//! constructor-injected so every step is testable with fakes. Failure
//! policy, in order of preference:
//!
//! 1. Analysis outage → continue with a fallback analysis string.
//! 2. Editing outage or no usable output → copy the optimized rendition
//!    into the library instead of fetching an edited image.
//! 3. Anything else after the claim → mark the job failed.
//!
//! Batch progress and transient cleanup run on the success *and*
//! failure paths; a failed child still counts toward its batch.

use std::sync::Arc;
use std::time::Duration;

use relight_cloud::{BlobError, BlobStore, FetchError, HttpFetcher, KeyStrategy, ObjectRef};
use relight_core::Job;
use relight_events::NotificationSink;
use relight_providers::{AnalysisRequest, EditRequest, ProviderRegistry};

use crate::service::{JobService, ServiceError};

/// Analysis prompt used when the job carries none.
pub const DEFAULT_ANALYSIS_PROMPT: &str = "Describe this photo's subject, lighting, and color \
     balance, and identify what would most improve it.";

/// Instructions handed to the editing provider alongside the analysis.
pub const DEFAULT_EDITING_INSTRUCTIONS: &str = "Enhance the photo following the analysis: \
     correct exposure and white balance, lift shadows, and keep the result natural. \
     Do not crop or add content.";

/// Analysis text substituted when the analysis provider is unavailable.
pub const FALLBACK_ANALYSIS: &str =
    "General photo enhancement: balance exposure, contrast, and color.";

/// Pipeline-wide settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bucket holding raw uploads and transient renditions.
    pub upload_bucket: String,
    /// Bucket holding final library objects.
    pub library_bucket: String,
    /// Lifetime of presigned URLs handed to providers.
    pub presign_ttl: Duration,
    pub default_prompt: String,
    pub editing_instructions: String,
    pub fallback_analysis: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_bucket: "relight-uploads".into(),
            library_bucket: "relight-library".into(),
            presign_ttl: Duration::from_secs(15 * 60),
            default_prompt: DEFAULT_ANALYSIS_PROMPT.into(),
            editing_instructions: DEFAULT_EDITING_INSTRUCTIONS.into(),
            fallback_analysis: FALLBACK_ANALYSIS.into(),
        }
    }
}

/// Error type for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Blob storage failed at {stage}: {source}")]
    Blob {
        stage: &'static str,
        source: BlobError,
    },

    #[error("Fetching edited image failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Top-level coordinator, invoked once per uploaded image.
pub struct Orchestrator {
    service: JobService,
    blob: Arc<dyn BlobStore>,
    fetcher: Arc<dyn HttpFetcher>,
    registry: Arc<ProviderRegistry>,
    notifier: Arc<dyn NotificationSink>,
    keys: KeyStrategy,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        service: JobService,
        blob: Arc<dyn BlobStore>,
        fetcher: Arc<dyn HttpFetcher>,
        registry: Arc<ProviderRegistry>,
        notifier: Arc<dyn NotificationSink>,
        keys: KeyStrategy,
        config: PipelineConfig,
    ) -> Self {
        Self {
            service,
            blob,
            fetcher,
            registry,
            notifier,
            keys,
            config,
        }
    }

    /// Run one job to a terminal status.
    ///
    /// A failed claim (step 1) propagates immediately with no side
    /// effects — another worker owns the job. After a successful claim
    /// the job always reaches COMPLETED or FAILED, the user is notified,
    /// batch progress advances, and transient objects are deleted.
    pub async fn process(&self, job: Job, uploaded: ObjectRef) -> Result<Job, PipelineError> {
        let temp_key = self
            .keys
            .temp_key(&job.user_id, job.job_id, &job.file_name);

        // Step 1: claim the job.
        let job = self.service.mark_processing(job.job_id, &temp_key).await?;
        tracing::info!(job_id = %job.job_id, user_id = %job.user_id, "Processing started");

        let optimized = ObjectRef::new(&self.config.upload_bucket, &temp_key);
        let result = self.run_pipeline(&job, &uploaded, &optimized).await;

        let (terminal_job, failure) = match result {
            Ok(completed) => (Some(completed), None),
            Err(err) => {
                tracing::error!(job_id = %job.job_id, error = %err, "Pipeline failed");
                let failed = match self.service.mark_failed(job.job_id, &err.to_string()).await {
                    Ok(failed) => Some(failed),
                    Err(mark_err) => {
                        tracing::error!(
                            job_id = %job.job_id,
                            error = %mark_err,
                            "Could not record job failure"
                        );
                        None
                    }
                };
                (failed, Some(err))
            }
        };

        // Notification failures are logged, never escalated.
        if let Some(terminal) = &terminal_job {
            if let Err(err) = self.notifier.notify_job_status(terminal).await {
                tracing::warn!(job_id = %terminal.job_id, error = %err, "Job notification failed");
            }
        }

        // A failed child still counts toward batch completion.
        self.advance_batch(&job).await;

        self.cleanup(&uploaded, &optimized).await;

        match (terminal_job, failure) {
            (_, Some(err)) => Err(err),
            (Some(completed), None) => Ok(completed),
            (None, None) => unreachable!("pipeline result must be terminal"),
        }
    }

    /// Steps 2–7: optimize, analyze, edit, finalize, complete.
    async fn run_pipeline(
        &self,
        job: &Job,
        uploaded: &ObjectRef,
        optimized: &ObjectRef,
    ) -> Result<Job, PipelineError> {
        // Step 2: optimized transient rendition + readable URL for the
        // providers.
        self.blob
            .optimize_and_store(uploaded, optimized)
            .await
            .map_err(|source| PipelineError::Blob {
                stage: "optimize",
                source,
            })?;
        let image_url = self
            .blob
            .presigned_download_url(optimized, self.config.presign_ttl)
            .await
            .map_err(|source| PipelineError::Blob {
                stage: "presign",
                source,
            })?;

        // Step 3: analysis, surviving provider outages with a fallback.
        let prompt = job
            .prompt
            .clone()
            .unwrap_or_else(|| self.config.default_prompt.clone());
        let analysis_outcome = self
            .registry
            .analysis()
            .analyze(&AnalysisRequest {
                image_url: image_url.clone(),
                prompt,
            })
            .await;
        let analysis = match analysis_outcome.result {
            Ok(result) => result.analysis,
            Err(err) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    provider = %analysis_outcome.provider,
                    retry_attempts = analysis_outcome.telemetry.retry_attempts,
                    breaker_state = analysis_outcome.telemetry.breaker_state.as_str(),
                    error = %err,
                    "Analysis failed, using fallback analysis"
                );
                self.config.fallback_analysis.clone()
            }
        };

        // Step 4.
        let job = self.service.mark_editing(job.job_id).await?;

        // Step 5.
        let edit_outcome = self
            .registry
            .editing()
            .edit(&EditRequest {
                image_url,
                analysis,
                instructions: self.config.editing_instructions.clone(),
            })
            .await;

        // Step 6: finalize. Editing failure or a success without an
        // output reference both route through the copy fallback.
        let final_key = self
            .keys
            .final_key(&job.user_id, job.job_id, &job.file_name);
        let final_ref = ObjectRef::new(&self.config.library_bucket, &final_key);

        let output_url = match edit_outcome.result {
            Ok(result) => result.output_url,
            Err(err) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    provider = %edit_outcome.provider,
                    retry_attempts = edit_outcome.telemetry.retry_attempts,
                    breaker_state = edit_outcome.telemetry.breaker_state.as_str(),
                    error = %err,
                    "Editing failed, falling back to optimized image"
                );
                None
            }
        };

        match output_url {
            Some(url) => {
                let bytes = self.fetcher.fetch(&url).await?;
                self.blob
                    .put(&final_ref, bytes, "image/jpeg")
                    .await
                    .map_err(|source| PipelineError::Blob {
                        stage: "finalize-put",
                        source,
                    })?;
            }
            None => {
                self.blob
                    .copy(optimized, &final_ref)
                    .await
                    .map_err(|source| PipelineError::Blob {
                        stage: "finalize-copy",
                        source,
                    })?;
            }
        }

        // Step 7.
        let job = self.service.mark_completed(job.job_id, &final_key).await?;
        tracing::info!(job_id = %job.job_id, final_key = %final_key, "Job completed");
        Ok(job)
    }

    /// Step 9: advance the owning batch and fire the completion
    /// notification exactly once.
    ///
    /// The increment returns the batch state produced by this call's own
    /// conditional write, so only the caller that performed the
    /// completing transition observes `is_complete`.
    async fn advance_batch(&self, job: &Job) {
        let Some(batch_id) = job.batch_id else {
            return;
        };
        match self.service.increment_batch_progress(batch_id).await {
            Ok(batch) if batch.is_complete() => {
                tracing::info!(
                    batch_id = %batch_id,
                    total_count = batch.total_count,
                    "Batch complete"
                );
                if let Err(err) = self.notifier.notify_batch_complete(&batch).await {
                    tracing::warn!(batch_id = %batch_id, error = %err, "Batch notification failed");
                }
            }
            Ok(batch) => {
                tracing::debug!(
                    batch_id = %batch_id,
                    completed = batch.completed_count,
                    total = batch.total_count,
                    "Batch progress advanced"
                );
            }
            Err(err) => {
                tracing::error!(batch_id = %batch_id, error = %err, "Failed to advance batch");
            }
        }
    }

    /// Step 10: best-effort deletion of the transient objects.
    async fn cleanup(&self, uploaded: &ObjectRef, optimized: &ObjectRef) {
        for obj in [uploaded, optimized] {
            if let Err(err) = self.blob.delete(obj).await {
                tracing::warn!(object = %obj, error = %err, "Transient cleanup failed");
            }
        }
    }
}
