use parley_agent::{
    AttachmentRecordView, CreatedThread, FileForAi, MessagePage, PaginationOpts,
    SendMessageResult, StreamArgs, ThreadView,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::optimistic::MessageCache;
use crate::protocol::{
    AbortResponse, CreateThreadRequest, ErrorBody, ListMessagesRequest, ModelList,
    SendMessageRequest, SignInRequest, SignInResponse, ThreadList, UpdateThreadRequest,
    UploadResponse, UploadUrlResponse,
};
use crate::routes::{self, Navigation, Route};
use crate::uploads::UploadTracker;

/// Typed client for the Parley HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        decode(response).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.request(method, path).json(body)).await
    }

    /// Like [`Self::send`], with 404 mapped to `None`
    async fn send_optional<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Option<T>> {
        let response = builder.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    // ---- auth ----

    /// Sign in and keep the session token for later calls
    pub async fn sign_in(&mut self, name: &str) -> Result<SignInResponse> {
        let body = SignInRequest {
            name: name.to_string(),
        };
        let session: SignInResponse = self.send_json(Method::POST, "/auth/signin", &body).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub fn sign_out(&mut self) {
        self.token = None;
    }

    // ---- threads ----

    pub async fn create_thread(&self, title: Option<String>) -> Result<CreatedThread> {
        self.send_json(Method::POST, "/threads", &CreateThreadRequest { title })
            .await
    }

    /// Threads plus their sidebar grouping for the given UTC offset
    pub async fn list_threads(&self, tz_offset_minutes: i32) -> Result<ThreadList> {
        let builder = self
            .request(Method::GET, "/threads")
            .query(&[("tzOffsetMinutes", tz_offset_minutes)]);
        self.send(builder).await
    }

    pub async fn latest_thread(&self) -> Result<Option<ThreadView>> {
        self.send_optional(self.request(Method::GET, "/threads/latest"))
            .await
    }

    pub async fn thread_by_uuid(&self, uuid: &str) -> Result<Option<ThreadView>> {
        self.send_optional(self.request(Method::GET, &format!("/threads/by-uuid/{uuid}")))
            .await
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<ThreadView> {
        self.send(self.request(Method::GET, &format!("/threads/{thread_id}")))
            .await
    }

    pub async fn update_thread(&self, thread_id: &str, update: &UpdateThreadRequest) -> Result<ThreadView> {
        self.send_json(Method::PATCH, &format!("/threads/{thread_id}"), update)
            .await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/threads/{thread_id}"))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    // ---- messages ----

    pub async fn send_message(&self, thread_id: &str, body: &SendMessageRequest) -> Result<SendMessageResult> {
        self.send_json(Method::POST, &format!("/threads/{thread_id}/messages"), body)
            .await
    }

    /// Send with an optimistic entry in `cache`, rolled back if the call fails
    pub async fn send_optimistic(
        &self,
        cache: &mut MessageCache,
        thread_id: &str,
        body: &SendMessageRequest,
        now_ms: i64,
    ) -> Result<SendMessageResult> {
        let optimistic_id = cache.insert_optimistic(thread_id, &body.prompt, now_ms);
        match self.send_message(thread_id, body).await {
            Ok(result) => Ok(result),
            Err(e) => {
                cache.rollback(thread_id, &optimistic_id);
                tracing::warn!(thread_id, error = %e, "send failed, optimistic message removed");
                Err(e)
            }
        }
    }

    pub async fn list_messages(
        &self,
        thread_id: &str,
        pagination_opts: PaginationOpts,
        stream_args: Option<StreamArgs>,
    ) -> Result<MessagePage> {
        let body = ListMessagesRequest {
            pagination_opts,
            stream_args,
        };
        self.send_json(Method::POST, &format!("/threads/{thread_id}/messages/list"), &body)
            .await
    }

    /// Fetch the first page and make it the thread's cache entry
    pub async fn refresh(&self, cache: &mut MessageCache, thread_id: &str, num_items: usize) -> Result<()> {
        let page = self
            .list_messages(thread_id, PaginationOpts::first(num_items), None)
            .await?;
        cache.replace(thread_id, &page);
        Ok(())
    }

    pub async fn attachment_records(&self, thread_id: &str) -> Result<Vec<AttachmentRecordView>> {
        self.send(self.request(Method::GET, &format!("/threads/{thread_id}/attachments")))
            .await
    }

    pub async fn abort(&self, thread_id: &str) -> Result<usize> {
        let response: AbortResponse = self
            .send(self.request(Method::POST, &format!("/threads/{thread_id}/abort")))
            .await?;
        Ok(response.aborted)
    }

    // ---- files ----

    pub async fn generate_upload_url(&self) -> Result<String> {
        let response: UploadUrlResponse = self
            .send(self.request(Method::POST, "/uploads/url"))
            .await?;
        Ok(response.upload_url)
    }

    /// Validate, upload and track one file; returns its storage id
    ///
    /// Files failing validation never reach the network.
    pub async fn upload_file(
        &self,
        tracker: &mut UploadTracker,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let temp_id = tracker.begin(file_name, content_type, bytes.len() as u64)?;
        match self.post_upload(content_type, bytes).await {
            Ok(storage_id) => {
                tracker.complete(&temp_id, &storage_id);
                Ok(storage_id)
            }
            Err(e) => {
                tracker.fail(&temp_id, e.to_string());
                Err(e)
            }
        }
    }

    async fn post_upload(&self, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let url = self.generate_upload_url().await?;
        let builder = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response: UploadResponse = self.send(builder).await?;
        Ok(response.storage_id)
    }

    pub async fn file_meta(&self, storage_id: &str) -> Result<Option<FileForAi>> {
        self.send(self.request(Method::GET, &format!("/files/{storage_id}/meta")))
            .await
    }

    pub async fn models(&self) -> Result<ModelList> {
        self.send(self.request(Method::GET, "/models")).await
    }

    // ---- routing ----

    /// Where a path leads for the current session
    pub async fn navigate(&self, path: &str) -> Result<Navigation> {
        let uuid = match routes::guard(path, self.is_authenticated()) {
            Navigation::Render(Route::ChatThread(uuid)) => uuid,
            other => return Ok(other),
        };
        let route = Route::ChatThread(uuid);
        match self.thread_by_uuid(&uuid.to_string()).await {
            Ok(thread) => Ok(routes::after_lookup(route, thread.is_some())),
            Err(e) if e.is_unauthenticated() => Ok(Navigation::Redirect(routes::SIGN_IN_PATH.to_string())),
            Err(e) => Err(e),
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.kind, body.error),
        Err(_) => ("unknown".to_string(), text),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        kind,
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}
