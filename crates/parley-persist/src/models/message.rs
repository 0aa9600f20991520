use chrono::{DateTime, Utc};
use parley_llm::TokenUsage;
use serde::{Deserialize, Serialize};

/// Authoritative conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub agent_thread_id: String,
    pub user_id: String,
    /// Position in the agent thread, unique and increasing
    pub order: u64,
    pub role: MessageRole,
    pub text: String,
    /// Model that produced an assistant message
    pub model: Option<String>,
    pub status: MessageStatus,
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
}

/// Message fields known before an order is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgentMessage {
    pub agent_thread_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub text: String,
    pub model: Option<String>,
    pub status: MessageStatus,
    pub usage: Option<TokenUsage>,
}

impl NewAgentMessage {
    pub fn user(agent_thread_id: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent_thread_id: agent_thread_id.into(),
            user_id: user_id.into(),
            role: MessageRole::User,
            text: text.into(),
            model: None,
            status: MessageStatus::Success,
            usage: None,
        }
    }

    pub fn assistant(
        agent_thread_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            agent_thread_id: agent_thread_id.into(),
            user_id: user_id.into(),
            role: MessageRole::Assistant,
            text: text.into(),
            model: Some(model.into()),
            status: MessageStatus::Success,
            usage: None,
        }
    }

    pub fn failed(mut self) -> Self {
        self.status = MessageStatus::Failed;
        self
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn into_message(self, order: u64) -> AgentMessage {
        AgentMessage {
            id: uuid::Uuid::new_v4().to_string(),
            agent_thread_id: self.agent_thread_id,
            user_id: self.user_id,
            order,
            role: self.role,
            text: self.text,
            model: self.model,
            status: self.status,
            usage: self.usage,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Success,
    Failed,
}
