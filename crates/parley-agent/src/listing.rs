//! Wire shapes of the paginated message listing
//!
//! A single listing call returns one page of authoritative messages plus,
//! optionally, the state of in-flight replies. The `streams` payload is either
//! a list of active streams or the deltas behind a set of cursors; the `kind`
//! tag tells them apart.

use parley_llm::TokenUsage;
use parley_persist::{AgentMessage, MessageRole, MessageStatus, StreamDelta, StreamRecord, StreamStatus};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Upper bound on `numItems`
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationOpts {
    pub num_items: usize,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl PaginationOpts {
    pub fn first(num_items: usize) -> Self {
        Self {
            num_items,
            cursor: None,
        }
    }

    pub(crate) fn limit(&self) -> usize {
        self.num_items.clamp(1, MAX_PAGE_SIZE)
    }

    /// Order below which the next page starts
    pub(crate) fn before_order(&self) -> Result<Option<u64>> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ChatError::validation(format!("Invalid cursor: {raw}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StreamArgs {
    #[serde(rename_all = "camelCase")]
    List {
        #[serde(default)]
        start_order: Option<u64>,
    },
    Deltas {
        cursors: Vec<StreamCursor>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCursor {
    pub stream_id: String,
    pub cursor: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesArgs {
    pub thread_id: String,
    pub pagination_opts: PaginationOpts,
    #[serde(default)]
    pub stream_args: Option<StreamArgs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub order: u64,
    pub role: MessageRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl From<AgentMessage> for MessageView {
    fn from(msg: AgentMessage) -> Self {
        Self {
            id: msg.id,
            order: msg.order,
            role: msg.role,
            text: msg.text,
            model: msg.model,
            status: msg.status,
            usage: msg.usage,
            created_at: msg.created_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamView {
    pub stream_id: String,
    pub status: StreamStatus,
    pub order: u64,
    pub step_order: u64,
    pub model: String,
}

impl From<StreamRecord> for StreamView {
    fn from(stream: StreamRecord) -> Self {
        Self {
            stream_id: stream.stream_id,
            status: stream.status,
            order: stream.order,
            step_order: stream.step_order,
            model: stream.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncStreams {
    List { messages: Vec<StreamView> },
    Deltas { deltas: Vec<StreamDelta> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub page: Vec<MessageView>,
    pub is_done: bool,
    pub continue_cursor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<SyncStreams>,
}

impl MessagePage {
    pub fn empty() -> Self {
        Self {
            page: Vec::new(),
            is_done: true,
            continue_cursor: String::new(),
            streams: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_args_shapes() {
        let list: StreamArgs = serde_json::from_value(json!({"kind": "list", "startOrder": 3})).unwrap();
        assert_eq!(list, StreamArgs::List { start_order: Some(3) });

        let deltas: StreamArgs = serde_json::from_value(json!({
            "kind": "deltas",
            "cursors": [{"streamId": "s1", "cursor": 10}]
        }))
        .unwrap();
        assert_eq!(
            deltas,
            StreamArgs::Deltas {
                cursors: vec![StreamCursor { stream_id: "s1".into(), cursor: 10 }]
            }
        );
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page = MessagePage {
            page: vec![],
            is_done: true,
            continue_cursor: "4".into(),
            streams: Some(SyncStreams::List { messages: vec![] }),
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(
            value,
            json!({
                "page": [],
                "isDone": true,
                "continueCursor": "4",
                "streams": {"kind": "list", "messages": []}
            })
        );
    }

    #[test]
    fn test_cursor_parsing() {
        let mut opts = PaginationOpts::first(500);
        assert_eq!(opts.limit(), MAX_PAGE_SIZE);
        assert_eq!(opts.before_order().unwrap(), None);

        opts.cursor = Some("12".into());
        assert_eq!(opts.before_order().unwrap(), Some(12));

        opts.cursor = Some("abc".into());
        assert!(matches!(opts.before_order(), Err(ChatError::Validation(_))));
    }
}
