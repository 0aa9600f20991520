//! Client-facing shapes of stored records

use chrono::{DateTime, Utc};
use parley_llm::{ModelId, Provider};
use parley_persist::{AttachmentRecord, Thread, ThreadStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub id: String,
    pub uuid: String,
    pub title: String,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Thread> for ThreadView {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            uuid: thread.uuid,
            title: thread.title,
            status: thread.status,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecordView {
    pub id: String,
    pub thread_id: String,
    pub body: String,
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl From<AttachmentRecord> for AttachmentRecordView {
    fn from(record: AttachmentRecord) -> Self {
        Self {
            id: record.id,
            thread_id: record.thread_id,
            body: record.body,
            attachments: record.attachments,
            message_id: record.message_id,
            created_at: record.created_at.timestamp_millis(),
        }
    }
}

/// Entry of the model picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: ModelId,
    pub display_name: String,
    pub provider: Provider,
    pub vision: bool,
    pub pdf: bool,
    pub web_search: bool,
    pub reasoning: bool,
    pub context_window: u32,
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub is_default: bool,
}

impl ModelInfo {
    pub fn new(id: ModelId, default_model: ModelId) -> Self {
        let spec = id.spec();
        Self {
            id,
            display_name: spec.display_name.to_string(),
            provider: spec.provider,
            vision: spec.capabilities.vision,
            pdf: spec.capabilities.pdf,
            web_search: spec.capabilities.web_search,
            reasoning: spec.capabilities.reasoning,
            context_window: spec.context_window,
            input_per_million: spec.pricing.input_per_million,
            output_per_million: spec.pricing.output_per_million,
            is_default: id == default_model,
        }
    }
}
