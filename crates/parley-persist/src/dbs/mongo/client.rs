use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database};

use crate::dbs::mongo::models::{MongoAgentThread, MongoThread};
use crate::error::{PersistError, Result};
use crate::models::{
    AgentMessage, AgentThread, AttachmentRecord, NewAgentMessage, Session, StoredFile,
    StreamDelta, StreamRecord, StreamStatus, Thread, ThreadStatus, UploadToken, User,
};
use crate::trait_client::PersistenceClient;

/// Attempts at the compare-and-set loop in `touch_thread`
const TOUCH_RETRIES: usize = 8;

pub struct MongoPersistenceClient {
    users: Collection<User>,
    sessions: Collection<Session>,
    threads: Collection<MongoThread>,
    agent_threads: Collection<MongoAgentThread>,
    messages: Collection<AgentMessage>,
    attachment_records: Collection<AttachmentRecord>,
    streams: Collection<StreamRecord>,
    deltas: Collection<StreamDelta>,
    files: Collection<StoredFile>,
    upload_tokens: Collection<UploadToken>,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        let db = client.database(database);
        tracing::info!(database, "connected to MongoDB");
        Ok(Self::from_database(&db))
    }

    pub fn from_database(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
            sessions: db.collection("sessions"),
            threads: db.collection("threads"),
            agent_threads: db.collection("agent_threads"),
            messages: db.collection("messages"),
            attachment_records: db.collection("attachment_records"),
            streams: db.collection("streams"),
            deltas: db.collection("stream_deltas"),
            files: db.collection("files"),
            upload_tokens: db.collection("upload_tokens"),
        }
    }

    async fn thread_doc(&self, thread_id: &str) -> Result<MongoThread> {
        self.threads
            .find_one(doc! { "_id": thread_id })
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    async fn reserve_order(&self, agent_thread_id: &str) -> Result<u64> {
        let before = self
            .agent_threads
            .find_one_and_update(
                doc! { "_id": agent_thread_id },
                doc! { "$inc": { "next_order": 1_i64 } },
            )
            .return_document(ReturnDocument::Before)
            .await?
            .ok_or_else(|| PersistError::AgentThreadNotFound(agent_thread_id.to_string()))?;
        Ok(before.next_order.max(0) as u64)
    }
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| PersistError::Internal(format!("timestamp out of range: {millis}")))
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    async fn create_user(&self, name: &str) -> Result<User> {
        let user = User::new(name);
        self.users.insert_one(&user).await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "id": user_id }).await?)
    }

    async fn create_session(&self, user_id: &str) -> Result<Session> {
        let session = Session::new(user_id);
        self.sessions.insert_one(&session).await?;
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.find_one(doc! { "token": token }).await?)
    }

    async fn create_thread(&self, user_id: &str, title: Option<String>) -> Result<Thread> {
        let thread = Thread::new(user_id, title);
        let doc: MongoThread = thread.clone().into();
        self.threads.insert_one(&doc).await?;
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let thread = self.threads.find_one(doc! { "_id": thread_id }).await?;
        Ok(thread.map(Into::into))
    }

    async fn get_thread_by_uuid(&self, uuid: &str) -> Result<Option<Thread>> {
        let thread = self.threads.find_one(doc! { "uuid": uuid }).await?;
        Ok(thread.map(Into::into))
    }

    async fn list_threads(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<Thread>> {
        let mut find = self
            .threads
            .find(doc! { "user_id": user_id })
            .sort(doc! { "updated_at": -1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let threads: Vec<MongoThread> = find.await?.try_collect().await?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn update_thread_title(&self, thread_id: &str, title: &str) -> Result<()> {
        let result = self
            .threads
            .update_one(doc! { "_id": thread_id }, doc! { "$set": { "title": title } })
            .await?;
        if result.matched_count == 0 {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    async fn set_thread_status(&self, thread_id: &str, status: ThreadStatus) -> Result<()> {
        let result = self
            .threads
            .update_one(
                doc! { "_id": thread_id },
                doc! { "$set": { "status": status.as_str() } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    async fn touch_thread(&self, thread_id: &str) -> Result<DateTime<Utc>> {
        for _ in 0..TOUCH_RETRIES {
            let current = self.thread_doc(thread_id).await?;
            let old = bson::DateTime::from_chrono(current.updated_at);
            let next_millis = Utc::now()
                .timestamp_millis()
                .max(old.timestamp_millis() + 1);
            let next = bson::DateTime::from_millis(next_millis);

            let result = self
                .threads
                .update_one(
                    doc! { "_id": thread_id, "updated_at": old },
                    doc! { "$set": { "updated_at": next } },
                )
                .await?;
            if result.modified_count == 1 {
                return millis_to_utc(next_millis);
            }
            tracing::debug!(thread_id, "touch lost a race, retrying");
        }
        Err(PersistError::Internal(format!(
            "could not advance updated_at for thread {thread_id}"
        )))
    }

    async fn link_agent_thread(&self, thread_id: &str, agent_thread_id: &str) -> Result<String> {
        let linked = self
            .threads
            .find_one_and_update(
                doc! { "_id": thread_id, "agent_thread_id": bson::Bson::Null },
                doc! { "$set": { "agent_thread_id": agent_thread_id } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        if let Some(thread) = linked {
            return thread
                .agent_thread_id
                .ok_or_else(|| PersistError::Internal("link did not persist".to_string()));
        }

        // Someone else linked first, or the thread is gone
        self.thread_doc(thread_id)
            .await?
            .agent_thread_id
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let thread = self.thread_doc(thread_id).await?;

        self.attachment_records
            .delete_many(doc! { "thread_id": thread_id })
            .await?;

        if let Some(agent_id) = thread.agent_thread_id.as_deref() {
            self.messages
                .delete_many(doc! { "agent_thread_id": agent_id })
                .await?;
            let streams: Vec<StreamRecord> = self
                .streams
                .find(doc! { "agent_thread_id": agent_id })
                .await?
                .try_collect()
                .await?;
            let stream_ids: Vec<String> = streams.into_iter().map(|s| s.stream_id).collect();
            if !stream_ids.is_empty() {
                self.deltas
                    .delete_many(doc! { "streamId": { "$in": stream_ids.clone() } })
                    .await?;
            }
            self.streams
                .delete_many(doc! { "agent_thread_id": agent_id })
                .await?;
            self.agent_threads
                .delete_one(doc! { "_id": agent_id })
                .await?;
        }

        self.threads.delete_one(doc! { "_id": thread_id }).await?;
        tracing::info!(thread_id, "thread deleted");
        Ok(())
    }

    async fn create_agent_thread(&self, user_id: &str) -> Result<AgentThread> {
        let agent_thread = AgentThread::new(user_id);
        let doc: MongoAgentThread = agent_thread.clone().into();
        self.agent_threads.insert_one(&doc).await?;
        Ok(agent_thread)
    }

    async fn delete_agent_thread(&self, agent_thread_id: &str) -> Result<()> {
        self.agent_threads
            .delete_one(doc! { "_id": agent_thread_id })
            .await?;
        Ok(())
    }

    async fn next_order(&self, agent_thread_id: &str) -> Result<u64> {
        self.reserve_order(agent_thread_id).await
    }

    async fn append_message(&self, message: NewAgentMessage) -> Result<AgentMessage> {
        let order = self.reserve_order(&message.agent_thread_id).await?;
        let message = message.into_message(order);
        self.messages.insert_one(&message).await?;
        Ok(message)
    }

    async fn save_message(&self, message: AgentMessage) -> Result<()> {
        self.messages.insert_one(&message).await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        agent_thread_id: &str,
        before_order: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AgentMessage>> {
        let mut filter = doc! { "agent_thread_id": agent_thread_id };
        if let Some(before) = before_order {
            filter.insert("order", doc! { "$lt": before as i64 });
        }
        let messages = self
            .messages
            .find(filter)
            .sort(doc! { "order": -1 })
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    async fn save_attachment_record(&self, record: AttachmentRecord) -> Result<()> {
        self.attachment_records.insert_one(&record).await?;
        Ok(())
    }

    async fn list_attachment_records(&self, thread_id: &str) -> Result<Vec<AttachmentRecord>> {
        let records = self
            .attachment_records
            .find(doc! { "thread_id": thread_id })
            .await?
            .try_collect()
            .await?;
        Ok(records)
    }

    async fn create_stream(&self, stream: StreamRecord) -> Result<()> {
        self.streams.insert_one(&stream).await?;
        Ok(())
    }

    async fn get_stream(&self, stream_id: &str) -> Result<Option<StreamRecord>> {
        Ok(self.streams.find_one(doc! { "stream_id": stream_id }).await?)
    }

    async fn set_stream_status(&self, stream_id: &str, status: StreamStatus) -> Result<()> {
        let result = self
            .streams
            .update_one(
                doc! { "stream_id": stream_id },
                doc! { "$set": { "status": status.as_str() } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PersistError::StreamNotFound(stream_id.to_string()));
        }
        Ok(())
    }

    async fn list_streams(
        &self,
        agent_thread_id: &str,
        status: StreamStatus,
        start_order: Option<u64>,
    ) -> Result<Vec<StreamRecord>> {
        let mut filter = doc! { "agent_thread_id": agent_thread_id, "status": status.as_str() };
        if let Some(start) = start_order {
            filter.insert("order", doc! { "$gte": start as i64 });
        }
        let streams = self
            .streams
            .find(filter)
            .sort(doc! { "order": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(streams)
    }

    async fn append_delta(&self, delta: StreamDelta) -> Result<()> {
        self.deltas.insert_one(&delta).await?;
        Ok(())
    }

    async fn list_deltas(&self, stream_id: &str, cursor: u64) -> Result<Vec<StreamDelta>> {
        // StreamDelta serializes camelCase
        let deltas = self
            .deltas
            .find(doc! { "streamId": stream_id, "start": { "$gte": cursor as i64 } })
            .sort(doc! { "start": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(deltas)
    }

    async fn save_file(&self, file: StoredFile) -> Result<()> {
        self.files.insert_one(&file).await?;
        Ok(())
    }

    async fn get_file(&self, storage_id: &str) -> Result<Option<StoredFile>> {
        Ok(self.files.find_one(doc! { "storage_id": storage_id }).await?)
    }

    async fn create_upload_token(&self, token: UploadToken) -> Result<()> {
        self.upload_tokens.insert_one(&token).await?;
        Ok(())
    }

    async fn consume_upload_token(&self, token: &str) -> Result<Option<UploadToken>> {
        Ok(self
            .upload_tokens
            .find_one_and_delete(doc! { "token": token })
            .await?)
    }
}
