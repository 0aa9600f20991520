use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::models::{AgentThread, Thread, ThreadStatus};

/// Thread document; dates are BSON datetimes so `updated_at` sorts natively
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub uuid: String,
    pub title: String,
    pub status: ThreadStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    pub agent_thread_id: Option<String>,
}

/// Agent thread document carrying the message order counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAgentThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub next_order: i64,
}

impl From<Thread> for MongoThread {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            user_id: thread.user_id,
            uuid: thread.uuid,
            title: thread.title,
            status: thread.status,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            agent_thread_id: thread.agent_thread_id,
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id,
            user_id: thread.user_id,
            uuid: thread.uuid,
            title: thread.title,
            status: thread.status,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            agent_thread_id: thread.agent_thread_id,
        }
    }
}

impl From<AgentThread> for MongoAgentThread {
    fn from(agent_thread: AgentThread) -> Self {
        Self {
            id: agent_thread.id,
            user_id: agent_thread.user_id,
            created_at: agent_thread.created_at,
            next_order: 0,
        }
    }
}

impl From<MongoAgentThread> for AgentThread {
    fn from(agent_thread: MongoAgentThread) -> Self {
        Self {
            id: agent_thread.id,
            user_id: agent_thread.user_id,
            created_at: agent_thread.created_at,
        }
    }
}
