//! Deterministic object-key derivation.
//!
//! Three storage areas, all keyed by `(user_id, job_id, file_name)`:
//!
//! - `uploads/incoming/` — raw client uploads.
//! - `uploads/tmp/`      — optimized transient renditions.
//! - `library/`          — durable final outputs.
//!
//! Transient keys share the `uploads/` prefix so a single lifecycle rule
//! can reap them.

use uuid::Uuid;

/// Prefix for raw client uploads.
const UPLOAD_PREFIX: &str = "uploads/incoming";
/// Prefix for optimized transient renditions.
const TEMP_PREFIX: &str = "uploads/tmp";
/// Prefix for durable final outputs.
const FINAL_PREFIX: &str = "library";

/// Derives storage keys for every stage of a job.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyStrategy;

impl KeyStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Key of the raw uploaded object.
    pub fn upload_key(&self, user_id: &str, job_id: Uuid, file_name: &str) -> String {
        format!(
            "{UPLOAD_PREFIX}/{user_id}/{job_id}/{}",
            sanitize(file_name)
        )
    }

    /// Key of the optimized transient rendition (always JPEG).
    pub fn temp_key(&self, user_id: &str, job_id: Uuid, file_name: &str) -> String {
        format!("{TEMP_PREFIX}/{user_id}/{job_id}/{}.jpg", stem(file_name))
    }

    /// Key of the final library object (always JPEG).
    pub fn final_key(&self, user_id: &str, job_id: Uuid, file_name: &str) -> String {
        format!("{FINAL_PREFIX}/{user_id}/{job_id}/{}.jpg", stem(file_name))
    }

    /// Content type inferred from a file name's extension.
    pub fn content_type(file_name: &str) -> &'static str {
        match extension(file_name).to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

/// Strip path separators and characters that do not belong in a key.
fn sanitize(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// File name without its last extension.
fn stem(file_name: &str) -> String {
    let clean = sanitize(file_name);
    match clean.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => clean,
    }
}

fn extension(file_name: &str) -> &str {
    file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> Uuid {
        Uuid::parse_str("0190b5a2-7c3e-7b9a-8f64-3a5c2e1d0f42").unwrap()
    }

    #[test]
    fn keys_are_deterministic() {
        let keys = KeyStrategy::new();
        let a = keys.final_key("user-1", job_id(), "beach.png");
        let b = keys.final_key("user-1", job_id(), "beach.png");
        assert_eq!(a, b);
    }

    #[test]
    fn upload_key_keeps_original_extension() {
        let keys = KeyStrategy::new();
        assert_eq!(
            keys.upload_key("user-1", job_id(), "beach.png"),
            format!("uploads/incoming/user-1/{}/beach.png", job_id())
        );
    }

    #[test]
    fn temp_and_final_keys_are_jpeg() {
        let keys = KeyStrategy::new();
        assert_eq!(
            keys.temp_key("user-1", job_id(), "beach.png"),
            format!("uploads/tmp/user-1/{}/beach.jpg", job_id())
        );
        assert_eq!(
            keys.final_key("user-1", job_id(), "beach.png"),
            format!("library/user-1/{}/beach.jpg", job_id())
        );
    }

    #[test]
    fn transient_keys_share_the_uploads_prefix() {
        let keys = KeyStrategy::new();
        assert!(keys
            .upload_key("u", job_id(), "a.jpg")
            .starts_with("uploads/"));
        assert!(keys.temp_key("u", job_id(), "a.jpg").starts_with("uploads/"));
        assert!(!keys.final_key("u", job_id(), "a.jpg").starts_with("uploads/"));
    }

    #[test]
    fn path_components_are_stripped_from_file_names() {
        let keys = KeyStrategy::new();
        let key = keys.upload_key("user-1", job_id(), "../../etc/passwd");
        assert!(!key.contains(".."));
        assert!(key.ends_with("/passwd"));
    }

    #[test]
    fn odd_characters_are_replaced() {
        let keys = KeyStrategy::new();
        let key = keys.upload_key("user-1", job_id(), "my photo (1).jpg");
        assert!(key.ends_with("/my-photo--1-.jpg"));
    }

    #[test]
    fn file_without_extension_keeps_its_stem() {
        let keys = KeyStrategy::new();
        let key = keys.temp_key("user-1", job_id(), "snapshot");
        assert!(key.ends_with("/snapshot.jpg"));
    }

    // -- content_type ---------------------------------------------------------

    #[test]
    fn content_types_by_extension() {
        assert_eq!(KeyStrategy::content_type("a.jpg"), "image/jpeg");
        assert_eq!(KeyStrategy::content_type("a.JPEG"), "image/jpeg");
        assert_eq!(KeyStrategy::content_type("a.png"), "image/png");
        assert_eq!(KeyStrategy::content_type("a.webp"), "image/webp");
        assert_eq!(
            KeyStrategy::content_type("archive.zip"),
            "application/octet-stream"
        );
        assert_eq!(
            KeyStrategy::content_type("noext"),
            "application/octet-stream"
        );
    }
}
