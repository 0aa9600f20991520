use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// Conversation container owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub user_id: String,
    /// Client-facing id used in URLs, decoupled from `id`
    pub uuid: String,
    pub title: String,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set lazily on first send, never reassigned
    pub agent_thread_id: Option<String>,
}

impl Thread {
    pub fn new(user_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| DEFAULT_THREAD_TITLE.to_string()),
            status: ThreadStatus::Active,
            created_at: now,
            updated_at: now,
            agent_thread_id: None,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_THREAD_TITLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Active,
    Archived,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Active => "active",
            ThreadStatus::Archived => "archived",
        }
    }
}

/// Owner of the authoritative message sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThread {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl AgentThread {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}
