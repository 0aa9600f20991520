use parley_persist::{is_allowed_content_type, MAX_UPLOAD_BYTES};
use serde::Serialize;
use thiserror::Error;

/// Why a file was refused before any upload started
///
/// The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("Files of type {0} are not supported")]
    UnsupportedType(String),

    #[error("File is too large ({size} bytes). Maximum size is 20 MB.")]
    TooLarge { size: u64 },

    #[error("File is empty")]
    Empty,
}

/// Check a file against the allow-list and size cap
pub fn validate_upload(content_type: &str, size: u64) -> Result<(), UploadRejection> {
    if !is_allowed_content_type(content_type) {
        return Err(UploadRejection::UnsupportedType(content_type.to_string()));
    }
    if size == 0 {
        return Err(UploadRejection::Empty);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge { size });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UploadState {
    Uploading,
    Ready,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    /// Temporary client id while uploading, the storage id once ready
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub state: UploadState,
}

/// Concurrent uploads of the composer, in the order they were picked
#[derive(Debug, Default)]
pub struct UploadTracker {
    entries: Vec<PendingUpload>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a file; returns its temporary id
    pub fn begin(&mut self, file_name: &str, content_type: &str, size: u64) -> Result<String, UploadRejection> {
        validate_upload(content_type, size)?;
        let id = format!("temp-{}", uuid::Uuid::new_v4());
        self.entries.push(PendingUpload {
            id: id.clone(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size,
            state: UploadState::Uploading,
        });
        Ok(id)
    }

    /// Swap the temporary id for the storage id, keeping the entry's position
    pub fn complete(&mut self, temp_id: &str, storage_id: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.id == temp_id) {
            Some(entry) => {
                entry.id = storage_id.to_string();
                entry.state = UploadState::Ready;
                true
            }
            None => false,
        }
    }

    pub fn fail(&mut self, temp_id: &str, error: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|e| e.id == temp_id) {
            Some(entry) => {
                entry.state = UploadState::Failed { error: error.into() };
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[PendingUpload] {
        &self.entries
    }

    /// Any upload still running; sending waits until this is false
    pub fn is_busy(&self) -> bool {
        self.entries.iter().any(|e| e.state == UploadState::Uploading)
    }

    /// Storage ids ready to attach, in pick order
    pub fn ready_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.state == UploadState::Ready)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Forget everything, e.g. after a successful send
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
