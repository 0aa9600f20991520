use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side record linking a sent prompt to its uploaded files
///
/// Only written when a send carries attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub thread_id: String,
    pub user_id: String,
    pub body: String,
    /// Storage ids, never empty
    pub attachments: Vec<String>,
    /// Authoritative message this record belongs to
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttachmentRecord {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        body: impl Into<String>,
        attachments: Vec<String>,
        message_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            body: body.into(),
            attachments,
            message_id,
            created_at: Utc::now(),
        }
    }
}
