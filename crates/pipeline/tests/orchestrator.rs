//! End-to-end orchestrator tests over fake collaborators.
//!
//! Every external surface (blob store, fetcher, providers, notifier) is
//! a recording fake, so each test can assert which paths ran and which
//! did not.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use relight_cloud::{BlobError, BlobStore, FetchError, HttpFetcher, KeyStrategy, ObjectRef};
use relight_core::{BatchJob, Job, JobStatus, NewBatchJob, NewJob};
use relight_db::MemoryJobRepository;
use relight_events::{NotificationSink, NotifyError};
use relight_pipeline::{JobService, Orchestrator, PipelineConfig, PipelineError};
use relight_providers::{
    AnalysisProvider, AnalysisRequest, AnalysisResult, CircuitState, EditRequest, EditResult,
    EditingProvider, ProviderError, ProviderRegistry, ResilienceOutcome, ResilienceTelemetry,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Blob operations recorded by name for call-path assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BlobCall {
    Optimize { src: String, dst: String },
    Presign { key: String },
    Put { key: String, bytes: usize },
    Copy { src: String, dst: String },
    Delete { key: String },
}

#[derive(Default)]
struct FakeBlob {
    calls: Mutex<Vec<BlobCall>>,
    fail_optimize: bool,
}

impl FakeBlob {
    fn failing_optimize() -> Self {
        Self {
            fail_optimize: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<BlobCall> {
        self.calls.lock().clone()
    }

    fn count(&self, pred: impl Fn(&BlobCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl BlobStore for FakeBlob {
    async fn optimize_and_store(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError> {
        self.calls.lock().push(BlobCall::Optimize {
            src: src.key.clone(),
            dst: dst.key.clone(),
        });
        if self.fail_optimize {
            return Err(BlobError::Request("disk on fire".into()));
        }
        Ok(())
    }

    async fn copy(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError> {
        self.calls.lock().push(BlobCall::Copy {
            src: src.key.clone(),
            dst: dst.key.clone(),
        });
        Ok(())
    }

    async fn put(
        &self,
        dst: &ObjectRef,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BlobError> {
        self.calls.lock().push(BlobCall::Put {
            key: dst.key.clone(),
            bytes: bytes.len(),
        });
        Ok(())
    }

    async fn delete(&self, obj: &ObjectRef) -> Result<(), BlobError> {
        self.calls.lock().push(BlobCall::Delete {
            key: obj.key.clone(),
        });
        Ok(())
    }

    async fn presigned_download_url(
        &self,
        obj: &ObjectRef,
        _expires_in: Duration,
    ) -> Result<String, BlobError> {
        self.calls.lock().push(BlobCall::Presign {
            key: obj.key.clone(),
        });
        Ok(format!("https://signed.example.com/{}", obj.key))
    }
}

#[derive(Default)]
struct FakeFetcher {
    fetches: AtomicU32,
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

fn ok_outcome<T>(provider: &str, value: T) -> ResilienceOutcome<T> {
    ResilienceOutcome {
        result: Ok(value),
        provider: provider.into(),
        duration: Duration::ZERO,
        timestamp: Utc::now(),
        telemetry: ResilienceTelemetry {
            retry_attempts: 0,
            breaker_state: CircuitState::Closed,
        },
    }
}

fn err_outcome<T>(provider: &str, err: ProviderError) -> ResilienceOutcome<T> {
    ResilienceOutcome {
        result: Err(err),
        provider: provider.into(),
        duration: Duration::ZERO,
        timestamp: Utc::now(),
        telemetry: ResilienceTelemetry {
            retry_attempts: 2,
            breaker_state: CircuitState::Closed,
        },
    }
}

struct FakeAnalysis {
    fail: bool,
}

#[async_trait]
impl AnalysisProvider for FakeAnalysis {
    fn name(&self) -> &str {
        "fake-analysis"
    }
    async fn is_healthy(&self) -> bool {
        true
    }
    async fn analyze(&self, _request: &AnalysisRequest) -> ResilienceOutcome<AnalysisResult> {
        if self.fail {
            err_outcome(
                "fake-analysis",
                ProviderError::Http {
                    status: 503,
                    body: "overloaded".into(),
                },
            )
        } else {
            ok_outcome(
                "fake-analysis",
                AnalysisResult {
                    analysis: "A dim photo of a harbor at dusk.".into(),
                },
            )
        }
    }
}

enum EditBehavior {
    Url(String),
    NoOutput,
    Fail,
}

struct FakeEditing {
    behavior: EditBehavior,
    requests: Mutex<Vec<EditRequest>>,
}

impl FakeEditing {
    fn new(behavior: EditBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EditingProvider for FakeEditing {
    fn name(&self) -> &str {
        "fake-editing"
    }
    async fn is_healthy(&self) -> bool {
        true
    }
    async fn edit(&self, request: &EditRequest) -> ResilienceOutcome<EditResult> {
        self.requests.lock().push(request.clone());
        match &self.behavior {
            EditBehavior::Url(url) => ok_outcome(
                "fake-editing",
                EditResult {
                    output_url: Some(url.clone()),
                },
            ),
            EditBehavior::NoOutput => ok_outcome("fake-editing", EditResult { output_url: None }),
            EditBehavior::Fail => err_outcome(
                "fake-editing",
                ProviderError::Timeout(30_000),
            ),
        }
    }
}

#[derive(Default)]
struct CountingNotifier {
    job_statuses: Mutex<Vec<JobStatus>>,
    batch_notifications: AtomicU32,
}

#[async_trait]
impl NotificationSink for CountingNotifier {
    async fn notify_job_status(&self, job: &Job) -> Result<(), NotifyError> {
        self.job_statuses.lock().push(job.status);
        Ok(())
    }
    async fn notify_batch_complete(&self, _batch: &BatchJob) -> Result<(), NotifyError> {
        self.batch_notifications.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    service: JobService,
    orchestrator: Orchestrator,
    blob: Arc<FakeBlob>,
    fetcher: Arc<FakeFetcher>,
    editing: Arc<FakeEditing>,
    notifier: Arc<CountingNotifier>,
}

fn harness(analysis_fails: bool, editing: EditBehavior, blob: FakeBlob) -> Harness {
    let service = JobService::new(Arc::new(MemoryJobRepository::new()));
    let blob = Arc::new(blob);
    let fetcher = Arc::new(FakeFetcher::default());
    let editing = Arc::new(FakeEditing::new(editing));
    let notifier = Arc::new(CountingNotifier::default());
    let registry = Arc::new(ProviderRegistry::with_adapters(
        Arc::new(FakeAnalysis {
            fail: analysis_fails,
        }),
        editing.clone(),
    ));

    let orchestrator = Orchestrator::new(
        service.clone(),
        blob.clone(),
        fetcher.clone(),
        registry,
        notifier.clone(),
        KeyStrategy::new(),
        PipelineConfig::default(),
    );

    Harness {
        service,
        orchestrator,
        blob,
        fetcher,
        editing,
        notifier,
    }
}

async fn queued_job(service: &JobService, batch_id: Option<uuid::Uuid>) -> (Job, ObjectRef) {
    let job = service
        .create_job(NewJob {
            user_id: "user-1".into(),
            file_name: "harbor.png".into(),
            prompt: Some("enhance".into()),
            locale: None,
            batch_id,
        })
        .await
        .unwrap();
    let uploaded = ObjectRef::new(
        "relight-uploads",
        KeyStrategy::new().upload_key(&job.user_id, job.job_id, &job.file_name),
    );
    (job, uploaded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_uploads_the_edited_image() {
    let h = harness(
        false,
        EditBehavior::Url("https://cdn.example.com/edited.jpg".into()),
        FakeBlob::default(),
    );
    let (job, uploaded) = queued_job(&h.service, None).await;

    let completed = h.orchestrator.process(job.clone(), uploaded).await.unwrap();

    assert_eq!(completed.status, JobStatus::Completed);
    let final_key = completed.final_key.expect("final_key must be set");
    assert!(final_key.starts_with("library/"));

    // Edited bytes were fetched and uploaded exactly once; no fallback copy.
    assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Put { .. })), 1);
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Copy { .. })), 0);

    // One job notification, no batch notification.
    assert_eq!(*h.notifier.job_statuses.lock(), vec![JobStatus::Completed]);
    assert_eq!(h.notifier.batch_notifications.load(Ordering::SeqCst), 0);

    // Both transient objects were cleaned up.
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Delete { .. })), 2);
}

#[tokio::test]
async fn editing_without_output_reference_takes_the_copy_fallback() {
    let h = harness(false, EditBehavior::NoOutput, FakeBlob::default());
    let (job, uploaded) = queued_job(&h.service, None).await;

    let completed = h.orchestrator.process(job, uploaded).await.unwrap();

    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Copy { .. })), 1);
    assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Put { .. })), 0);
}

#[tokio::test]
async fn editing_failure_takes_the_copy_fallback() {
    let h = harness(false, EditBehavior::Fail, FakeBlob::default());
    let (job, uploaded) = queued_job(&h.service, None).await;

    let completed = h.orchestrator.process(job, uploaded).await.unwrap();

    assert_eq!(completed.status, JobStatus::Completed);
    assert!(completed.final_key.is_some());
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Copy { .. })), 1);
    assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analysis_outage_falls_back_and_still_completes() {
    let h = harness(true, EditBehavior::NoOutput, FakeBlob::default());
    let (job, uploaded) = queued_job(&h.service, None).await;

    let completed = h.orchestrator.process(job, uploaded).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);

    // The editing provider received the fallback analysis, not nothing.
    let requests = h.editing.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].analysis,
        relight_pipeline::orchestrator::FALLBACK_ANALYSIS
    );
}

#[tokio::test]
async fn optimize_failure_marks_the_job_failed_and_still_cleans_up() {
    let h = harness(false, EditBehavior::NoOutput, FakeBlob::failing_optimize());
    let (job, uploaded) = queued_job(&h.service, None).await;

    let err = h
        .orchestrator
        .process(job.clone(), uploaded)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Blob { stage: "optimize", .. }));

    let failed = h.service.find_job(job.job_id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    let reason = failed.error.expect("error must be recorded");
    assert!(reason.contains("optimize"));

    // The user still heard about it, and cleanup still ran.
    assert_eq!(*h.notifier.job_statuses.lock(), vec![JobStatus::Failed]);
    assert_eq!(h.blob.count(|c| matches!(c, BlobCall::Delete { .. })), 2);
}

#[tokio::test]
async fn lost_claim_propagates_with_no_side_effects() {
    let h = harness(false, EditBehavior::NoOutput, FakeBlob::default());
    let (job, uploaded) = queued_job(&h.service, None).await;

    // Another worker already claimed this job.
    h.service.mark_processing(job.job_id, "tmp").await.unwrap();

    let err = h.orchestrator.process(job, uploaded).await.unwrap_err();
    assert!(matches!(err, PipelineError::Service(_)));

    assert!(h.blob.calls().is_empty(), "no blob calls may happen");
    assert!(h.notifier.job_statuses.lock().is_empty());
    assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_completion_notifies_exactly_once() {
    let h = harness(false, EditBehavior::NoOutput, FakeBlob::default());
    let batch = h
        .service
        .create_batch(NewBatchJob {
            user_id: "user-1".into(),
            file_count: 2,
            shared_prompt: Some("enhance".into()),
            individual_prompts: None,
        })
        .await
        .unwrap();

    let (job_a, uploaded_a) = queued_job(&h.service, Some(batch.batch_id)).await;
    let (job_b, uploaded_b) = queued_job(&h.service, Some(batch.batch_id)).await;

    h.orchestrator.process(job_a, uploaded_a).await.unwrap();
    assert_eq!(h.notifier.batch_notifications.load(Ordering::SeqCst), 0);

    h.orchestrator.process(job_b, uploaded_b).await.unwrap();
    assert_eq!(h.notifier.batch_notifications.load(Ordering::SeqCst), 1);

    let final_batch = h.service.find_batch(batch.batch_id).await.unwrap();
    assert_eq!(final_batch.completed_count, 2);
    assert!(final_batch.is_complete());
}

#[tokio::test]
async fn failed_child_still_advances_its_batch() {
    let h = harness(false, EditBehavior::NoOutput, FakeBlob::failing_optimize());
    let batch = h
        .service
        .create_batch(NewBatchJob {
            user_id: "user-1".into(),
            file_count: 1,
            shared_prompt: None,
            individual_prompts: None,
        })
        .await
        .unwrap();

    let (job, uploaded) = queued_job(&h.service, Some(batch.batch_id)).await;
    let _ = h.orchestrator.process(job.clone(), uploaded).await;

    let failed = h.service.find_job(job.job_id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);

    let final_batch = h.service.find_batch(batch.batch_id).await.unwrap();
    assert_eq!(final_batch.completed_count, 1);
    assert!(final_batch.is_complete());
    assert_eq!(h.notifier.batch_notifications.load(Ordering::SeqCst), 1);
}
