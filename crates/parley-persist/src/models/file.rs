use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of an uploaded file; bytes live in the blob store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub storage_id: String,
    pub user_id: String,
    pub content_type: String,
    pub size: u64,
    /// Base64 SHA-256 of the bytes
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Single-use permission to upload one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadToken {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl UploadToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Largest accepted upload, 20 MiB
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Content types accepted for upload
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/webm",
    "audio/mp4",
    "video/mp4",
    "video/webm",
    "video/quicktime",
];

/// Whether a content type is on the allow-list, ignoring parameters like `charset`
pub fn is_allowed_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        assert!(is_allowed_content_type("image/png"));
        assert!(is_allowed_content_type("text/plain; charset=utf-8"));
        assert!(is_allowed_content_type("Application/PDF"));
        assert!(!is_allowed_content_type("application/zip"));
        assert!(!is_allowed_content_type(""));
    }
}
