use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parley_llm::{
    ChatOptions, ChatRequest, ContentPart, ModelHandle, ModelId, ProviderError,
    ProviderRegistry, StreamEvent, TokenUsage,
};
use parley_persist::{BlobStore, NewAgentMessage, PersistenceClient, StreamRecord, StreamStatus};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::Instrument;

use crate::config::{ChatSettings, GenerationConfig};
use crate::content::{attachment_part, history_messages};
use crate::delta::DeltaWriter;
use crate::error::{ChatError, Result};

/// One assistant reply to produce
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub thread_id: String,
    pub agent_thread_id: String,
    pub user_id: String,
    /// User message the reply answers; attachments are attached to it
    pub prompt_message_id: String,
    /// Order of the prompt; history never reaches past it
    pub prompt_order: u64,
    /// Order reserved for the reply when the prompt was sent
    pub reply_order: u64,
    pub model: ModelId,
    pub web_search: bool,
    pub attachment_ids: Vec<String>,
}

/// A job waiting for a permit, with the abort epoch seen when it was queued
struct QueuedJob {
    job: GenerationJob,
    epoch: u64,
}

#[derive(Default)]
struct AbortState {
    /// Flags of running streams, keyed by stream id
    running: HashMap<String, (String, Arc<AtomicBool>)>,
    /// Jobs queued but not started, per agent thread
    queued: HashMap<String, usize>,
    /// Bumped by every abort while jobs are queued
    epochs: HashMap<String, u64>,
}

/// Abort bookkeeping for queued jobs and running streams
#[derive(Clone, Default)]
pub struct AbortRegistry {
    inner: Arc<Mutex<AbortState>>,
}

impl AbortRegistry {
    /// Count a job as queued and return the current abort epoch
    async fn enqueue(&self, agent_thread_id: &str) -> u64 {
        let mut state = self.inner.lock().await;
        *state.queued.entry(agent_thread_id.to_string()).or_default() += 1;
        state.epochs.get(agent_thread_id).copied().unwrap_or_default()
    }

    /// Move a queued job to running; the flag starts raised when an abort
    /// landed after the job was queued
    pub async fn start(&self, stream_id: &str, agent_thread_id: &str, epoch: u64) -> Arc<AtomicBool> {
        let mut state = self.inner.lock().await;
        let aborted = state.epochs.get(agent_thread_id).copied().unwrap_or_default() != epoch;
        Self::dequeue_locked(&mut state, agent_thread_id);
        let flag = Arc::new(AtomicBool::new(aborted));
        state.running.insert(
            stream_id.to_string(),
            (agent_thread_id.to_string(), flag.clone()),
        );
        flag
    }

    /// Forget a queued job that will never start
    async fn dequeue(&self, agent_thread_id: &str) {
        let mut state = self.inner.lock().await;
        Self::dequeue_locked(&mut state, agent_thread_id);
    }

    fn dequeue_locked(state: &mut AbortState, agent_thread_id: &str) {
        let Some(count) = state.queued.get_mut(agent_thread_id) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            // no queued job holds an epoch of this thread any more
            state.queued.remove(agent_thread_id);
            state.epochs.remove(agent_thread_id);
        }
    }

    pub async fn remove(&self, stream_id: &str) {
        self.inner.lock().await.running.remove(stream_id);
    }

    /// Abort every queued job and running stream of an agent thread
    ///
    /// Returns how many were signalled.
    pub async fn abort_agent_thread(&self, agent_thread_id: &str) -> usize {
        let mut state = self.inner.lock().await;
        let mut count = 0;
        for (owner, flag) in state.running.values() {
            if owner == agent_thread_id {
                flag.store(true, Ordering::SeqCst);
                count += 1;
            }
        }
        let queued = state.queued.get(agent_thread_id).copied().unwrap_or_default();
        if queued > 0 {
            *state.epochs.entry(agent_thread_id.to_string()).or_default() += 1;
        }
        count + queued
    }
}

/// How a generation ended
#[derive(Debug)]
enum Outcome {
    Finished { usage: Option<TokenUsage> },
    Aborted,
    Failed { error: String },
}

/// Everything a running job needs, shared by all jobs
struct GenerationContext {
    db: Arc<dyn PersistenceClient>,
    blobs: Arc<dyn BlobStore>,
    registry: Arc<ProviderRegistry>,
    settings: ChatSettings,
    config: GenerationConfig,
    aborts: AbortRegistry,
}

/// Handle to the background generation queue
///
/// Jobs are consumed by a dispatcher task that runs each on its own task,
/// at most `max_concurrency` at a time. Dropping every handle closes the
/// queue; running jobs finish on their own.
#[derive(Clone)]
pub struct GenerationWorker {
    tx: mpsc::Sender<QueuedJob>,
    aborts: AbortRegistry,
}

impl GenerationWorker {
    /// Start the dispatcher; must be called inside a tokio runtime
    pub fn spawn(
        db: Arc<dyn PersistenceClient>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<ProviderRegistry>,
        settings: ChatSettings,
        config: GenerationConfig,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueuedJob>(config.queue_capacity.max(1));
        let aborts = AbortRegistry::default();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let ctx = Arc::new(GenerationContext {
            db,
            blobs,
            registry,
            settings,
            config,
            aborts: aborts.clone(),
        });

        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    let _permit = permit;
                    ctx.run(queued).await;
                });
            }
            tracing::info!("generation queue closed");
        });

        Self { tx, aborts }
    }

    /// Queue a job without waiting for it to run
    ///
    /// An abort of the agent thread issued before the job starts stops it
    /// without calling upstream.
    pub async fn enqueue(&self, job: GenerationJob) -> Result<()> {
        let agent_thread_id = job.agent_thread_id.clone();
        let epoch = self.aborts.enqueue(&agent_thread_id).await;
        if self.tx.send(QueuedJob { job, epoch }).await.is_err() {
            self.aborts.dequeue(&agent_thread_id).await;
            return Err(ChatError::Upstream(
                "generation worker is not running".to_string(),
            ));
        }
        Ok(())
    }

    pub fn aborts(&self) -> &AbortRegistry {
        &self.aborts
    }
}

impl GenerationContext {
    async fn run(&self, queued: QueuedJob) {
        let QueuedJob { job, epoch } = queued;
        let span = tracing::info_span!(
            "generation",
            thread_id = %job.thread_id,
            agent_thread_id = %job.agent_thread_id,
            model = %job.model,
        );
        async {
            let started = std::time::Instant::now();
            match self.generate(&job, epoch).await {
                Ok(()) => tracing::info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "generation complete"
                ),
                Err(e) => tracing::error!(error = %e, "generation could not be recorded"),
            }
        }
        .instrument(span)
        .await
    }

    async fn generate(&self, job: &GenerationJob, epoch: u64) -> Result<()> {
        let stream = StreamRecord::new(&job.agent_thread_id, job.reply_order, job.model.as_str());
        if let Err(e) = self.db.create_stream(stream.clone()).await {
            self.aborts.dequeue(&job.agent_thread_id).await;
            return Err(e.into());
        }
        let aborted = self
            .aborts
            .start(&stream.stream_id, &job.agent_thread_id, epoch)
            .await;

        let mut writer = DeltaWriter::new(
            self.db.clone(),
            &stream.stream_id,
            self.config.flush_chars,
        );
        let outcome = if aborted.load(Ordering::SeqCst) {
            Outcome::Aborted
        } else {
            match self.prepare(job).await {
                Ok((handle, request)) => {
                    self.stream_with_retries(&handle, &request, &mut writer, &aborted)
                        .await
                }
                Err(e) => Outcome::Failed {
                    error: e.to_string(),
                },
            }
        };
        self.aborts.remove(&stream.stream_id).await;

        self.finish(job, &stream, writer.into_text(), outcome).await
    }

    /// Resolve the model and build the upstream request
    async fn prepare(&self, job: &GenerationJob) -> Result<(ModelHandle, ChatRequest)> {
        let handle = self
            .registry
            .model(job.model)
            .map_err(|e| ChatError::Upstream(e.to_string()))?;
        let caps = handle.spec.capabilities;

        let mut history = self
            .db
            .list_messages(
                &job.agent_thread_id,
                Some(job.prompt_order + 1),
                self.settings.history_limit,
            )
            .await?;
        history.reverse();

        let mut attachments: Vec<ContentPart> = Vec::with_capacity(job.attachment_ids.len());
        for storage_id in &job.attachment_ids {
            let (Some(file), Some(bytes)) = (
                self.db.get_file(storage_id).await?,
                self.blobs.get(storage_id).await?,
            ) else {
                tracing::warn!(storage_id, "attachment vanished before generation");
                continue;
            };
            attachments.push(attachment_part(&file, &bytes, &caps));
        }

        let web_search = job.web_search && caps.web_search;
        if job.web_search && !caps.web_search {
            tracing::warn!(model = %job.model, "model has no web search, flag ignored");
        }

        let messages = history_messages(
            self.settings.system_prompt.as_deref(),
            &history,
            &job.prompt_message_id,
            attachments,
        );

        let mut options = ChatOptions::new().web_search(web_search);
        if let Some(temperature) = self.settings.temperature {
            options = options.temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_output_tokens {
            options = options.max_tokens(max_tokens);
        }
        let request =
            ChatRequest::new(job.model.upstream_for(web_search), messages).with_options(options);
        Ok((handle, request))
    }

    async fn stream_with_retries(
        &self,
        handle: &ModelHandle,
        request: &ChatRequest,
        writer: &mut DeltaWriter,
        aborted: &AtomicBool,
    ) -> Outcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(handle, request, writer, aborted).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    let retryable = writer.is_empty()
                        && attempt < max_attempts
                        && ProviderError::is_transient_error(&e);
                    if !retryable {
                        tracing::error!(attempt, error = %e, "generation failed");
                        return Outcome::Failed {
                            error: e.to_string(),
                        };
                    }
                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        handle: &ModelHandle,
        request: &ChatRequest,
        writer: &mut DeltaWriter,
        aborted: &AtomicBool,
    ) -> anyhow::Result<Outcome> {
        let mut events = handle.client.chat_stream(request.clone()).await?;
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.flush_interval_ms.max(1)));
        ticker.tick().await;
        let mut usage = None;

        loop {
            if aborted.load(Ordering::SeqCst) {
                writer.flush().await?;
                return Ok(Outcome::Aborted);
            }
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(StreamEvent::Message { content })) => {
                        writer.push(&content);
                        if writer.should_flush() {
                            writer.flush().await?;
                        }
                    }
                    Some(Ok(StreamEvent::Usage { usage: u })) => usage = Some(u),
                    // Some providers signal completion more than once
                    Some(Ok(StreamEvent::Done { .. })) => {}
                    Some(Err(e)) => {
                        writer.flush().await?;
                        return Err(e);
                    }
                    None => break,
                },
                _ = ticker.tick() => writer.flush().await?,
            }
        }

        writer.flush().await?;
        Ok(Outcome::Finished { usage })
    }

    async fn finish(
        &self,
        job: &GenerationJob,
        stream: &StreamRecord,
        text: String,
        outcome: Outcome,
    ) -> Result<()> {
        let base = |text: String| {
            NewAgentMessage::assistant(&job.agent_thread_id, &job.user_id, text, job.model.as_str())
        };

        let (message, status) = match outcome {
            Outcome::Finished { usage } => {
                if let Some(usage) = &usage {
                    tracing::info!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        cost_usd = job.model.cost(usage),
                        "usage"
                    );
                }
                (Some(base(text).with_usage(usage)), StreamStatus::Finished)
            }
            Outcome::Aborted => {
                tracing::info!(chars = text.chars().count(), "generation aborted");
                let partial = (!text.is_empty()).then(|| base(text));
                (partial, StreamStatus::Aborted)
            }
            Outcome::Failed { error } => {
                let notice = format!("The response could not be generated: {error}");
                (Some(base(notice).failed()), StreamStatus::Aborted)
            }
        };

        if let Some(message) = message {
            self.db.save_message(message.into_message(stream.order)).await?;
        }
        self.db.set_stream_status(&stream.stream_id, status).await?;
        if let Err(e) = self.db.touch_thread(&job.thread_id).await {
            tracing::warn!(error = %e, "could not bump thread after reply");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_abort_while_queued_raises_flag_at_start() {
        let aborts = AbortRegistry::default();
        let epoch = aborts.enqueue("a1").await;
        assert_eq!(aborts.abort_agent_thread("a1").await, 1);

        let flag = aborts.start("s1", "a1", epoch).await;
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_counts_running_and_queued() {
        let aborts = AbortRegistry::default();
        let first = aborts.enqueue("a1").await;
        let running = aborts.start("s1", "a1", first).await;
        let second = aborts.enqueue("a1").await;
        aborts.enqueue("other").await;

        assert!(!running.load(Ordering::SeqCst));
        assert_eq!(aborts.abort_agent_thread("a1").await, 2);
        assert!(running.load(Ordering::SeqCst));
        assert!(aborts.start("s2", "a1", second).await.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_earlier_abort_does_not_touch_later_jobs() {
        let aborts = AbortRegistry::default();
        let epoch = aborts.enqueue("a1").await;
        aborts.abort_agent_thread("a1").await;
        aborts.start("s1", "a1", epoch).await;
        aborts.remove("s1").await;

        assert_eq!(aborts.abort_agent_thread("a1").await, 0);
        let epoch = aborts.enqueue("a1").await;
        assert!(!aborts.start("s2", "a1", epoch).await.load(Ordering::SeqCst));
    }
}
