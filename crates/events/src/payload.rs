//! Localized push-payload builders.
//!
//! Pure functions — no I/O, unit-testable. Locale matching is on the
//! primary language subtag (`"es-MX"` matches `"es"`), falling back to
//! English.

use relight_core::{BatchJob, Job, JobStatus};
use serde_json::Value;

/// Title and body for one notification, in the user's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationText {
    pub title: String,
    pub body: String,
}

/// Primary language subtag of a locale string.
fn language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Localized text for a job status notification.
pub fn job_status_text(locale: &str, status: JobStatus) -> NotificationText {
    let (title, body) = match (language(locale), status) {
        ("es", JobStatus::Completed) => ("Foto lista", "Tu foto mejorada está lista."),
        ("es", JobStatus::Failed) => (
            "Error al procesar",
            "No pudimos procesar tu foto. Inténtalo de nuevo.",
        ),
        ("ja", JobStatus::Completed) => ("写真の準備ができました", "補正した写真をご覧いただけます。"),
        ("ja", JobStatus::Failed) => ("処理に失敗しました", "写真を処理できませんでした。もう一度お試しください。"),
        (_, JobStatus::Completed) => ("Photo ready", "Your enhanced photo is ready to view."),
        (_, JobStatus::Failed) => (
            "Enhancement failed",
            "We couldn't process your photo. Please try again.",
        ),
        // Non-terminal statuses are not normally notified; keep a
        // neutral fallback rather than panicking on a caller mistake.
        (_, other) => {
            return NotificationText {
                title: "Photo update".to_string(),
                body: format!("Your photo is {other}."),
            }
        }
    };
    NotificationText {
        title: title.to_string(),
        body: body.to_string(),
    }
}

/// Localized text for a batch completion notification.
pub fn batch_complete_text(locale: &str, total: u32) -> NotificationText {
    let (title, body) = match language(locale) {
        "es" => (
            "Lote completado".to_string(),
            format!("Las {total} fotos de tu lote están listas."),
        ),
        "ja" => (
            "一括処理が完了しました".to_string(),
            format!("{total}枚の写真の処理が完了しました。"),
        ),
        _ => (
            "Batch complete".to_string(),
            format!("All {total} photos in your batch are done."),
        ),
    };
    NotificationText { title, body }
}

/// Gateway payload for a job status notification.
pub fn job_status_payload(job: &Job) -> Value {
    let text = job_status_text(&job.locale, job.status);
    serde_json::json!({
        "kind": "job_status",
        "user_id": job.user_id,
        "job_id": job.job_id,
        "status": job.status,
        "title": text.title,
        "body": text.body,
        "final_key": job.final_key,
        "error": job.error,
    })
}

/// Gateway payload for a batch completion notification.
pub fn batch_complete_payload(batch: &BatchJob, locale: &str) -> Value {
    let text = batch_complete_text(locale, batch.total_count);
    serde_json::json!({
        "kind": "batch_complete",
        "user_id": batch.user_id,
        "batch_id": batch.batch_id,
        "completed_count": batch.completed_count,
        "total_count": batch.total_count,
        "title": text.title,
        "body": text.body,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
