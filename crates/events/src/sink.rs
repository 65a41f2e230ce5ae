//! The notification contract and the no-op sink.

use async_trait::async_trait;
use relight_core::{BatchJob, Job};

/// Errors from a notification delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Push gateway returned HTTP {0}")]
    HttpStatus(u16),
}

/// Fire-and-forget notification surface.
///
/// Callers log a returned error and move on — a lost notification never
/// fails a job.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Tell the user their job reached a terminal status.
    async fn notify_job_status(&self, job: &Job) -> Result<(), NotifyError>;

    /// Tell the user their whole batch is done.
    async fn notify_batch_complete(&self, batch: &BatchJob) -> Result<(), NotifyError>;
}

/// Sink that logs and drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify_job_status(&self, job: &Job) -> Result<(), NotifyError> {
        tracing::debug!(job_id = %job.job_id, status = %job.status, "Dropping job notification");
        Ok(())
    }

    async fn notify_batch_complete(&self, batch: &BatchJob) -> Result<(), NotifyError> {
        tracing::debug!(batch_id = %batch.batch_id, "Dropping batch notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relight_core::{NewBatchJob, NewJob};

    #[tokio::test]
    async fn noop_sink_always_succeeds() {
        let job = Job::new(NewJob {
            user_id: "user-1".into(),
            file_name: "a.jpg".into(),
            prompt: None,
            locale: None,
            batch_id: None,
        })
        .unwrap();
        let batch = BatchJob::new(NewBatchJob {
            user_id: "user-1".into(),
            file_count: 1,
            shared_prompt: None,
            individual_prompts: None,
        })
        .unwrap();

        let sink = NoopNotifier;
        assert!(sink.notify_job_status(&job).await.is_ok());
        assert!(sink.notify_batch_complete(&batch).await.is_ok());
    }
}
