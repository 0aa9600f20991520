use std::sync::Arc;

use parley_llm::{ModelId, ProviderRegistry};
use parley_persist::{
    AttachmentRecord, NewAgentMessage, PersistenceClient, Session, StreamStatus, Thread,
    ThreadStatus, User,
};
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::config::ChatSettings;
use crate::content::WEB_SEARCH_TAG;
use crate::error::{ChatError, Result};
use crate::files::FileService;
use crate::listing::{ListMessagesArgs, MessagePage, MessageView, StreamArgs, SyncStreams};
use crate::worker::{GenerationJob, GenerationWorker};

/// Most attachments accepted on one message
pub const MAX_ATTACHMENTS: usize = 10;

/// Characters of the first prompt kept as the thread title
pub const TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageArgs {
    pub thread_id: String,
    pub prompt: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    #[serde(default)]
    pub enable_web_search: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedThread {
    pub thread_id: String,
    pub uuid: String,
}

/// Title derived from a thread's first prompt
pub fn title_from_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(TITLE_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

/// Thread, message and generation operations on behalf of a caller
pub struct ChatService {
    db: Arc<dyn PersistenceClient>,
    registry: Arc<ProviderRegistry>,
    files: Arc<FileService>,
    worker: GenerationWorker,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        db: Arc<dyn PersistenceClient>,
        registry: Arc<ProviderRegistry>,
        files: Arc<FileService>,
        worker: GenerationWorker,
        settings: ChatSettings,
    ) -> Self {
        Self {
            db,
            registry,
            files,
            worker,
            settings,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn default_model(&self) -> ModelId {
        self.settings.default_model
    }

    // ---- identity ----

    /// Create a user and a session for them
    pub async fn sign_in(&self, name: &str) -> Result<(User, Session)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("Name is required"));
        }
        let user = self.db.create_user(name).await?;
        let session = self.db.create_session(&user.id).await?;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok((user, session))
    }

    /// Resolve a bearer token; unknown tokens are anonymous
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Caller> {
        let Some(token) = token else {
            return Ok(Caller::Anonymous);
        };
        let session = self.db.get_session(token).await?;
        Ok(session.map(|s| s.user_id).into())
    }

    // ---- threads ----

    /// Thread owned by the caller; missing and foreign threads look alike
    async fn owned_thread(&self, user_id: &str, thread_id: &str) -> Result<Thread> {
        match self.db.get_thread(thread_id).await? {
            Some(thread) if thread.user_id == user_id => Ok(thread),
            _ => Err(ChatError::Unauthorized),
        }
    }

    pub async fn create_thread(&self, caller: &Caller, title: Option<String>) -> Result<CreatedThread> {
        let user_id = caller.require()?;
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let thread = self.db.create_thread(user_id, title).await?;
        tracing::info!(thread_id = %thread.id, "thread created");
        Ok(CreatedThread {
            thread_id: thread.id,
            uuid: thread.uuid,
        })
    }

    pub async fn list_threads(&self, caller: &Caller) -> Result<Vec<Thread>> {
        let user_id = caller.require()?;
        Ok(self.db.list_threads(user_id, None).await?)
    }

    pub async fn get_thread(&self, caller: &Caller, thread_id: &str) -> Result<Thread> {
        let user_id = caller.require()?;
        self.owned_thread(user_id, thread_id).await
    }

    pub async fn get_thread_by_uuid(&self, caller: &Caller, uuid: &str) -> Result<Option<Thread>> {
        let user_id = caller.require()?;
        let thread = self.db.get_thread_by_uuid(uuid).await?;
        Ok(thread.filter(|t| t.user_id == user_id))
    }

    pub async fn latest_thread(&self, caller: &Caller) -> Result<Option<Thread>> {
        let user_id = caller.require()?;
        Ok(self.db.list_threads(user_id, Some(1)).await?.into_iter().next())
    }

    pub async fn rename_thread(&self, caller: &Caller, thread_id: &str, title: &str) -> Result<()> {
        let user_id = caller.require()?;
        self.owned_thread(user_id, thread_id).await?;
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::validation("Title cannot be empty"));
        }
        self.db.update_thread_title(thread_id, title).await?;
        Ok(())
    }

    pub async fn set_thread_status(
        &self,
        caller: &Caller,
        thread_id: &str,
        status: ThreadStatus,
    ) -> Result<()> {
        let user_id = caller.require()?;
        self.owned_thread(user_id, thread_id).await?;
        self.db.set_thread_status(thread_id, status).await?;
        Ok(())
    }

    pub async fn delete_thread(&self, caller: &Caller, thread_id: &str) -> Result<()> {
        let user_id = caller.require()?;
        let thread = self.owned_thread(user_id, thread_id).await?;
        if let Some(agent_id) = thread.agent_thread_id.as_deref() {
            self.worker.aborts().abort_agent_thread(agent_id).await;
        }
        self.db.delete_thread(thread_id).await?;
        tracing::info!(thread_id, "thread deleted");
        Ok(())
    }

    pub async fn list_attachment_records(
        &self,
        caller: &Caller,
        thread_id: &str,
    ) -> Result<Vec<AttachmentRecord>> {
        let user_id = caller.require()?;
        self.owned_thread(user_id, thread_id).await?;
        Ok(self.db.list_attachment_records(thread_id).await?)
    }

    // ---- messages ----

    /// Persist a prompt and schedule its reply
    ///
    /// Every precondition is checked before anything is written.
    pub async fn send_message(&self, caller: &Caller, args: SendMessageArgs) -> Result<SendMessageResult> {
        let user_id = caller.require()?;
        let thread = self.owned_thread(user_id, &args.thread_id).await?;

        let prompt = args.prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::validation("Prompt cannot be empty"));
        }

        let model = match args.model_id.as_deref() {
            None => self.settings.default_model,
            Some(raw) => raw
                .parse::<ModelId>()
                .map_err(|e| ChatError::validation(e.to_string()))?,
        };
        if !self.registry.is_enabled(model.provider()) {
            return Err(ChatError::validation(format!(
                "Model {model} is not available: provider {} is not configured",
                model.provider()
            )));
        }

        if args.attachment_ids.len() > MAX_ATTACHMENTS {
            return Err(ChatError::validation(format!(
                "At most {MAX_ATTACHMENTS} attachments per message"
            )));
        }
        for storage_id in &args.attachment_ids {
            self.files.owned_file(user_id, storage_id).await?;
        }

        // 1. agent thread linkage, created once
        let first_message = thread.agent_thread_id.is_none();
        let agent_thread_id = match thread.agent_thread_id.clone() {
            Some(id) => id,
            None => {
                let agent = self.db.create_agent_thread(user_id).await?;
                let linked = self.db.link_agent_thread(&thread.id, &agent.id).await?;
                if linked != agent.id {
                    tracing::debug!(thread_id = %thread.id, orphan = %agent.id, "lost link race");
                    self.db.delete_agent_thread(&agent.id).await?;
                }
                linked
            }
        };

        // 2. authoritative user message
        let text = if args.enable_web_search {
            format!("{WEB_SEARCH_TAG}{prompt}")
        } else {
            prompt.to_string()
        };
        let message = self
            .db
            .append_message(NewAgentMessage::user(&agent_thread_id, user_id, text))
            .await?;
        // the reply sits right after its prompt even if more prompts follow
        let reply_order = self.db.next_order(&agent_thread_id).await?;

        // 3. association record
        if !args.attachment_ids.is_empty() {
            let record = AttachmentRecord::new(
                &thread.id,
                user_id,
                prompt,
                args.attachment_ids.clone(),
                Some(message.id.clone()),
            );
            self.db.save_attachment_record(record).await?;
        }

        // 4. background reply
        let attachment_count = args.attachment_ids.len();
        self.worker
            .enqueue(GenerationJob {
                thread_id: thread.id.clone(),
                agent_thread_id,
                user_id: user_id.to_string(),
                prompt_message_id: message.id.clone(),
                prompt_order: message.order,
                reply_order,
                model,
                web_search: args.enable_web_search,
                attachment_ids: args.attachment_ids,
            })
            .await?;

        // 5. thread bookkeeping
        self.db.touch_thread(&thread.id).await?;
        if first_message && thread.has_default_title() {
            self.db
                .update_thread_title(&thread.id, &title_from_prompt(prompt))
                .await?;
        }

        tracing::info!(
            thread_id = %thread.id,
            message_id = %message.id,
            model = %model,
            attachments = attachment_count,
            "message sent"
        );
        Ok(SendMessageResult {
            message_id: message.id,
        })
    }

    pub async fn list_messages(&self, caller: &Caller, args: ListMessagesArgs) -> Result<MessagePage> {
        let user_id = caller.require()?;
        let thread = self.owned_thread(user_id, &args.thread_id).await?;
        let limit = args.pagination_opts.limit();
        let before = args.pagination_opts.before_order()?;

        let Some(agent_thread_id) = thread.agent_thread_id else {
            return Ok(MessagePage::empty());
        };

        let mut messages = self
            .db
            .list_messages(&agent_thread_id, before, limit + 1)
            .await?;
        let is_done = messages.len() <= limit;
        messages.truncate(limit);

        let continue_cursor = messages
            .last()
            .map(|m| m.order.to_string())
            .or(args.pagination_opts.cursor.clone())
            .unwrap_or_default();

        let streams = match args.stream_args {
            None => None,
            Some(StreamArgs::List { start_order }) => {
                let streams = self
                    .db
                    .list_streams(&agent_thread_id, StreamStatus::Streaming, start_order)
                    .await?;
                Some(SyncStreams::List {
                    messages: streams.into_iter().map(Into::into).collect(),
                })
            }
            Some(StreamArgs::Deltas { cursors }) => {
                let mut deltas = Vec::new();
                for cursor in cursors {
                    // Streams of other threads are silently skipped
                    match self.db.get_stream(&cursor.stream_id).await? {
                        Some(stream) if stream.agent_thread_id == agent_thread_id => {
                            deltas.extend(
                                self.db.list_deltas(&cursor.stream_id, cursor.cursor).await?,
                            );
                        }
                        _ => continue,
                    }
                }
                Some(SyncStreams::Deltas { deltas })
            }
        };

        Ok(MessagePage {
            page: messages.into_iter().map(MessageView::from).collect(),
            is_done,
            continue_cursor,
            streams,
        })
    }

    /// Stop every queued or running reply of a thread; returns how many were stopped
    pub async fn abort_generation(&self, caller: &Caller, thread_id: &str) -> Result<usize> {
        let user_id = caller.require()?;
        let thread = self.owned_thread(user_id, thread_id).await?;
        let Some(agent_thread_id) = thread.agent_thread_id else {
            return Ok(0);
        };

        let streams = self
            .db
            .list_streams(&agent_thread_id, StreamStatus::Streaming, None)
            .await?;
        for stream in &streams {
            self.db
                .set_stream_status(&stream.stream_id, StreamStatus::Aborted)
                .await?;
        }
        let signalled = self.worker.aborts().abort_agent_thread(&agent_thread_id).await;
        // streams left over by an earlier process have no flag
        let aborted = signalled.max(streams.len());
        tracing::info!(thread_id, aborted, "generation aborted");
        Ok(aborted)
    }
}
