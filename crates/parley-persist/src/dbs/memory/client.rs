use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{
    AgentMessage, AgentThread, AttachmentRecord, NewAgentMessage, Session, StoredFile,
    StreamDelta, StreamRecord, StreamStatus, Thread, ThreadStatus, UploadToken, User,
};
use crate::trait_client::PersistenceClient;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
    threads: HashMap<String, Thread>,
    agent_threads: HashMap<String, AgentThread>,
    /// Next free order per agent thread
    counters: HashMap<String, u64>,
    messages: Vec<AgentMessage>,
    attachment_records: Vec<AttachmentRecord>,
    streams: HashMap<String, StreamRecord>,
    deltas: Vec<StreamDelta>,
    files: HashMap<String, StoredFile>,
    upload_tokens: HashMap<String, UploadToken>,
}

/// In-process store used for development and tests
///
/// Every operation takes the single lock, so compare-and-set operations are
/// trivially atomic.
#[derive(Default)]
pub struct MemoryPersistenceClient {
    state: RwLock<State>,
}

impl MemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceClient for MemoryPersistenceClient {
    async fn create_user(&self, name: &str) -> Result<User> {
        let user = User::new(name);
        self.state.write().await.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn create_session(&self, user_id: &str) -> Result<Session> {
        let session = Session::new(user_id);
        self.state
            .write()
            .await
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(token).cloned())
    }

    async fn create_thread(&self, user_id: &str, title: Option<String>) -> Result<Thread> {
        let thread = Thread::new(user_id, title);
        self.state
            .write()
            .await
            .threads
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.state.read().await.threads.get(thread_id).cloned())
    }

    async fn get_thread_by_uuid(&self, uuid: &str) -> Result<Option<Thread>> {
        Ok(self
            .state
            .read()
            .await
            .threads
            .values()
            .find(|t| t.uuid == uuid)
            .cloned())
    }

    async fn list_threads(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<Thread>> {
        let state = self.state.read().await;
        let mut threads: Vec<Thread> = state
            .threads
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            threads.truncate(limit.max(0) as usize);
        }
        Ok(threads)
    }

    async fn update_thread_title(&self, thread_id: &str, title: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        thread.title = title.to_string();
        Ok(())
    }

    async fn set_thread_status(&self, thread_id: &str, status: ThreadStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        thread.status = status;
        Ok(())
    }

    async fn touch_thread(&self, thread_id: &str) -> Result<DateTime<Utc>> {
        let mut state = self.state.write().await;
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        let next = Utc::now().max(thread.updated_at + Duration::milliseconds(1));
        thread.updated_at = next;
        Ok(next)
    }

    async fn link_agent_thread(&self, thread_id: &str, agent_thread_id: &str) -> Result<String> {
        let mut state = self.state.write().await;
        let thread = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        let linked = thread
            .agent_thread_id
            .get_or_insert_with(|| agent_thread_id.to_string());
        Ok(linked.clone())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let thread = state
            .threads
            .remove(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;

        state.attachment_records.retain(|r| r.thread_id != thread_id);

        if let Some(agent_id) = thread.agent_thread_id {
            state.agent_threads.remove(&agent_id);
            state.counters.remove(&agent_id);
            state.messages.retain(|m| m.agent_thread_id != agent_id);
            let stream_ids: Vec<String> = state
                .streams
                .values()
                .filter(|s| s.agent_thread_id == agent_id)
                .map(|s| s.stream_id.clone())
                .collect();
            for id in &stream_ids {
                state.streams.remove(id);
            }
            state.deltas.retain(|d| !stream_ids.contains(&d.stream_id));
        }
        Ok(())
    }

    async fn create_agent_thread(&self, user_id: &str) -> Result<AgentThread> {
        let agent_thread = AgentThread::new(user_id);
        let mut state = self.state.write().await;
        state.counters.insert(agent_thread.id.clone(), 0);
        state
            .agent_threads
            .insert(agent_thread.id.clone(), agent_thread.clone());
        Ok(agent_thread)
    }

    async fn delete_agent_thread(&self, agent_thread_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.agent_threads.remove(agent_thread_id);
        state.counters.remove(agent_thread_id);
        Ok(())
    }

    async fn next_order(&self, agent_thread_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let counter = state
            .counters
            .get_mut(agent_thread_id)
            .ok_or_else(|| PersistError::AgentThreadNotFound(agent_thread_id.to_string()))?;
        let order = *counter;
        *counter += 1;
        Ok(order)
    }

    async fn append_message(&self, message: NewAgentMessage) -> Result<AgentMessage> {
        let mut state = self.state.write().await;
        let counter = state
            .counters
            .get_mut(&message.agent_thread_id)
            .ok_or_else(|| PersistError::AgentThreadNotFound(message.agent_thread_id.clone()))?;
        let order = *counter;
        *counter += 1;
        let message = message.into_message(order);
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn save_message(&self, message: AgentMessage) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.agent_threads.contains_key(&message.agent_thread_id) {
            return Err(PersistError::AgentThreadNotFound(message.agent_thread_id));
        }
        state.messages.push(message);
        Ok(())
    }

    async fn list_messages(
        &self,
        agent_thread_id: &str,
        before_order: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AgentMessage>> {
        let state = self.state.read().await;
        let mut messages: Vec<AgentMessage> = state
            .messages
            .iter()
            .filter(|m| m.agent_thread_id == agent_thread_id)
            .filter(|m| before_order.map_or(true, |b| m.order < b))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.order.cmp(&a.order));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn save_attachment_record(&self, record: AttachmentRecord) -> Result<()> {
        self.state.write().await.attachment_records.push(record);
        Ok(())
    }

    async fn list_attachment_records(&self, thread_id: &str) -> Result<Vec<AttachmentRecord>> {
        Ok(self
            .state
            .read()
            .await
            .attachment_records
            .iter()
            .filter(|r| r.thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn create_stream(&self, stream: StreamRecord) -> Result<()> {
        self.state
            .write()
            .await
            .streams
            .insert(stream.stream_id.clone(), stream);
        Ok(())
    }

    async fn get_stream(&self, stream_id: &str) -> Result<Option<StreamRecord>> {
        Ok(self.state.read().await.streams.get(stream_id).cloned())
    }

    async fn set_stream_status(&self, stream_id: &str, status: StreamStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let stream = state
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| PersistError::StreamNotFound(stream_id.to_string()))?;
        stream.status = status;
        Ok(())
    }

    async fn list_streams(
        &self,
        agent_thread_id: &str,
        status: StreamStatus,
        start_order: Option<u64>,
    ) -> Result<Vec<StreamRecord>> {
        let state = self.state.read().await;
        let mut streams: Vec<StreamRecord> = state
            .streams
            .values()
            .filter(|s| s.agent_thread_id == agent_thread_id && s.status == status)
            .filter(|s| start_order.map_or(true, |o| s.order >= o))
            .cloned()
            .collect();
        streams.sort_by_key(|s| s.order);
        Ok(streams)
    }

    async fn append_delta(&self, delta: StreamDelta) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.streams.contains_key(&delta.stream_id) {
            return Err(PersistError::StreamNotFound(delta.stream_id));
        }
        state.deltas.push(delta);
        Ok(())
    }

    async fn list_deltas(&self, stream_id: &str, cursor: u64) -> Result<Vec<StreamDelta>> {
        let state = self.state.read().await;
        let mut deltas: Vec<StreamDelta> = state
            .deltas
            .iter()
            .filter(|d| d.stream_id == stream_id && d.start >= cursor)
            .cloned()
            .collect();
        deltas.sort_by_key(|d| d.start);
        Ok(deltas)
    }

    async fn save_file(&self, file: StoredFile) -> Result<()> {
        self.state
            .write()
            .await
            .files
            .insert(file.storage_id.clone(), file);
        Ok(())
    }

    async fn get_file(&self, storage_id: &str) -> Result<Option<StoredFile>> {
        Ok(self.state.read().await.files.get(storage_id).cloned())
    }

    async fn create_upload_token(&self, token: UploadToken) -> Result<()> {
        self.state
            .write()
            .await
            .upload_tokens
            .insert(token.token.clone(), token);
        Ok(())
    }

    async fn consume_upload_token(&self, token: &str) -> Result<Option<UploadToken>> {
        Ok(self.state.write().await.upload_tokens.remove(token))
    }
}
