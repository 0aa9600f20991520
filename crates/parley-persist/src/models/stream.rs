use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-flight assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub stream_id: String,
    pub agent_thread_id: String,
    /// Order the finished assistant message will take
    pub order: u64,
    pub step_order: u64,
    pub status: StreamStatus,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl StreamRecord {
    pub fn new(agent_thread_id: impl Into<String>, order: u64, model: impl Into<String>) -> Self {
        Self {
            stream_id: uuid::Uuid::new_v4().to_string(),
            agent_thread_id: agent_thread_id.into(),
            order,
            step_order: 0,
            status: StreamStatus::Streaming,
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Streaming,
    Finished,
    Aborted,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Streaming => "streaming",
            StreamStatus::Finished => "finished",
            StreamStatus::Aborted => "aborted",
        }
    }
}

/// A contiguous slice of streamed output, `start..end` in characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDelta {
    pub stream_id: String,
    pub start: u64,
    pub end: u64,
    pub parts: Vec<DeltaPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeltaPart {
    TextDelta { text: String },
}

impl DeltaPart {
    pub fn text(&self) -> &str {
        match self {
            DeltaPart::TextDelta { text } => text,
        }
    }
}
