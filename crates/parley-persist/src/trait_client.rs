use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AgentMessage, AgentThread, AttachmentRecord, NewAgentMessage, Session, StoredFile,
    StreamDelta, StreamRecord, StreamStatus, Thread, ThreadStatus, UploadToken, User,
};

/// Trait for database persistence operations
///
/// Implementations provide database-specific storage for every Parley record.
/// Ownership checks are the caller's job; these methods trust their ids.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    // ---- users & sessions ----

    async fn create_user(&self, name: &str) -> Result<User>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn create_session(&self, user_id: &str) -> Result<Session>;

    async fn get_session(&self, token: &str) -> Result<Option<Session>>;

    // ---- threads ----

    async fn create_thread(&self, user_id: &str, title: Option<String>) -> Result<Thread>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    async fn get_thread_by_uuid(&self, uuid: &str) -> Result<Option<Thread>>;

    /// List a user's threads, most recently updated first
    async fn list_threads(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<Thread>>;

    async fn update_thread_title(&self, thread_id: &str, title: &str) -> Result<()>;

    async fn set_thread_status(&self, thread_id: &str, status: ThreadStatus) -> Result<()>;

    /// Advance `updated_at` and return the new value
    ///
    /// The returned timestamp is strictly greater than the previous one even
    /// when two touches land within the same clock tick.
    async fn touch_thread(&self, thread_id: &str) -> Result<DateTime<Utc>>;

    /// Link an agent thread if none is linked yet
    ///
    /// Returns the linkage in effect afterwards, which is the earlier one if a
    /// concurrent caller won.
    async fn link_agent_thread(&self, thread_id: &str, agent_thread_id: &str) -> Result<String>;

    /// Delete a thread and everything hanging off it
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    // ---- agent threads & messages ----

    async fn create_agent_thread(&self, user_id: &str) -> Result<AgentThread>;

    /// Drop an agent thread that never got linked, with its order counter
    async fn delete_agent_thread(&self, agent_thread_id: &str) -> Result<()>;

    /// Reserve the next message order of an agent thread
    async fn next_order(&self, agent_thread_id: &str) -> Result<u64>;

    /// Assign an order and store the message
    async fn append_message(&self, message: NewAgentMessage) -> Result<AgentMessage>;

    /// Store a message whose order was reserved earlier
    async fn save_message(&self, message: AgentMessage) -> Result<()>;

    /// Page through messages newest first, strictly below `before_order`
    async fn list_messages(
        &self,
        agent_thread_id: &str,
        before_order: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AgentMessage>>;

    // ---- attachment records ----

    async fn save_attachment_record(&self, record: AttachmentRecord) -> Result<()>;

    async fn list_attachment_records(&self, thread_id: &str) -> Result<Vec<AttachmentRecord>>;

    // ---- streams ----

    async fn create_stream(&self, stream: StreamRecord) -> Result<()>;

    async fn get_stream(&self, stream_id: &str) -> Result<Option<StreamRecord>>;

    async fn set_stream_status(&self, stream_id: &str, status: StreamStatus) -> Result<()>;

    /// Streams of an agent thread with the given status and `order >= start_order`
    async fn list_streams(
        &self,
        agent_thread_id: &str,
        status: StreamStatus,
        start_order: Option<u64>,
    ) -> Result<Vec<StreamRecord>>;

    async fn append_delta(&self, delta: StreamDelta) -> Result<()>;

    /// Deltas of a stream with `start >= cursor`, in start order
    async fn list_deltas(&self, stream_id: &str, cursor: u64) -> Result<Vec<StreamDelta>>;

    // ---- files & upload tokens ----

    async fn save_file(&self, file: StoredFile) -> Result<()>;

    async fn get_file(&self, storage_id: &str) -> Result<Option<StoredFile>>;

    async fn create_upload_token(&self, token: UploadToken) -> Result<()>;

    /// Remove and return a token; a second call for the same token yields `None`
    async fn consume_upload_token(&self, token: &str) -> Result<Option<UploadToken>>;
}
