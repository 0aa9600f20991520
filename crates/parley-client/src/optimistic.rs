use std::collections::HashMap;

use parley_agent::{MessagePage, MessageView};
use parley_persist::{MessageRole, MessageStatus};
use serde::Serialize;

/// Id prefix of messages that exist only in the local cache
pub const OPTIMISTIC_PREFIX: &str = "optimistic-";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    pub optimistic: bool,
}

impl From<&MessageView> for DisplayMessage {
    fn from(view: &MessageView) -> Self {
        Self {
            id: view.id.clone(),
            role: view.role,
            content: view.text.clone(),
            status: view.status,
            created_at: view.created_at,
            optimistic: false,
        }
    }
}

/// First page of each thread's message listing, newest first
///
/// A sent prompt shows up at once as an optimistic entry. The next
/// authoritative page for that thread replaces the whole entry, which drops
/// the optimistic message whether or not the server has caught up.
#[derive(Debug, Default)]
pub struct MessageCache {
    entries: HashMap<String, Vec<DisplayMessage>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `prompt` in `thread_id` before the server confirms it
    pub fn insert_optimistic(&mut self, thread_id: &str, prompt: &str, now_ms: i64) -> String {
        let id = format!("{OPTIMISTIC_PREFIX}{}", uuid::Uuid::new_v4());
        let message = DisplayMessage {
            id: id.clone(),
            role: MessageRole::User,
            content: prompt.to_string(),
            status: MessageStatus::Success,
            created_at: now_ms,
            optimistic: true,
        };
        self.entries
            .entry(thread_id.to_string())
            .or_default()
            .insert(0, message);
        id
    }

    /// Undo an optimistic insert after the send failed
    pub fn rollback(&mut self, thread_id: &str, optimistic_id: &str) -> bool {
        let Some(messages) = self.entries.get_mut(thread_id) else {
            return false;
        };
        let before = messages.len();
        messages.retain(|m| m.id != optimistic_id);
        messages.len() != before
    }

    /// Replace a thread's entry with an authoritative page
    pub fn replace(&mut self, thread_id: &str, page: &MessagePage) {
        let messages = page.page.iter().map(DisplayMessage::from).collect();
        self.entries.insert(thread_id.to_string(), messages);
    }

    pub fn messages(&self, thread_id: &str) -> &[DisplayMessage] {
        self.entries
            .get(thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_pending(&self, thread_id: &str) -> bool {
        self.messages(thread_id).iter().any(|m| m.optimistic)
    }

    pub fn evict(&mut self, thread_id: &str) {
        self.entries.remove(thread_id);
    }
}
