use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use std::sync::Arc;

use parley_agent::{AttachmentRecordView, CreatedThread, ThreadView};
use parley_client::group_threads;
use parley_client::protocol::{AbortResponse, CreateThreadRequest, ThreadList, UpdateThreadRequest};
use crate::{
    auth::Auth,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListThreadsQuery {
    /// Client offset east of UTC, used for the sidebar buckets
    #[serde(default)]
    pub tz_offset_minutes: i32,
}

/// Create a new thread
#[utoipa::path(
    post,
    path = "/threads",
    responses(
        (status = 201, description = "Thread created"),
        (status = 401, description = "Not signed in")
    ),
    tag = "threads"
)]
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<CreatedThread>)> {
    let created = state.chat.create_thread(&caller, req.title).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List the caller's threads, newest activity first, with sidebar groups
#[utoipa::path(
    get,
    path = "/threads",
    params(
        ("tzOffsetMinutes" = Option<i32>, Query, description = "Client UTC offset in minutes (default: 0)")
    ),
    responses(
        (status = 200, description = "Threads and their time buckets"),
        (status = 401, description = "Not signed in")
    ),
    tag = "threads"
)]
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Query(query): Query<ListThreadsQuery>,
) -> ApiResult<Json<ThreadList>> {
    let offset = FixedOffset::east_opt(query.tz_offset_minutes.saturating_mul(60))
        .ok_or_else(|| ApiError::BadRequest("tzOffsetMinutes out of range".to_string()))?;

    let threads: Vec<ThreadView> = state
        .chat
        .list_threads(&caller)
        .await?
        .into_iter()
        .map(ThreadView::from)
        .collect();
    let groups = group_threads(&threads, &Utc::now().with_timezone(&offset));

    Ok(Json(ThreadList { threads, groups }))
}

/// Most recently active thread
#[utoipa::path(
    get,
    path = "/threads/latest",
    responses(
        (status = 200, description = "Latest thread"),
        (status = 404, description = "The caller has no threads")
    ),
    tag = "threads"
)]
pub async fn latest_thread(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
) -> ApiResult<Json<ThreadView>> {
    let thread = state
        .chat
        .latest_thread(&caller)
        .await?
        .ok_or_else(|| ApiError::NotFound("No threads yet".to_string()))?;
    Ok(Json(thread.into()))
}

/// Resolve a thread's public uuid
#[utoipa::path(
    get,
    path = "/threads/by-uuid/{uuid}",
    params(
        ("uuid" = String, Path, description = "Thread uuid")
    ),
    responses(
        (status = 200, description = "Thread details"),
        (status = 404, description = "No such thread for the caller")
    ),
    tag = "threads"
)]
pub async fn thread_by_uuid(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(uuid): Path<String>,
) -> ApiResult<Json<ThreadView>> {
    let thread = state
        .chat
        .get_thread_by_uuid(&caller, &uuid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Thread not found: {uuid}")))?;
    Ok(Json(thread.into()))
}

/// Get a specific thread by ID
#[utoipa::path(
    get,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread details"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "threads"
)]
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadView>> {
    let thread = state.chat.get_thread(&caller, &thread_id).await?;
    Ok(Json(thread.into()))
}

/// Rename and/or archive a thread
#[utoipa::path(
    patch,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Updated thread"),
        (status = 400, description = "Empty title"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "threads"
)]
pub async fn update_thread(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
    Json(req): Json<UpdateThreadRequest>,
) -> ApiResult<Json<ThreadView>> {
    if let Some(title) = req.title.as_deref() {
        state.chat.rename_thread(&caller, &thread_id, title).await?;
    }
    if let Some(status) = req.status {
        state.chat.set_thread_status(&caller, &thread_id, status).await?;
    }
    let thread = state.chat.get_thread(&caller, &thread_id).await?;
    Ok(Json(thread.into()))
}

/// Delete a thread with its messages, streams and attachment records
#[utoipa::path(
    delete,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 204, description = "Thread deleted"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "threads"
)]
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.chat.delete_thread(&caller, &thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attachment association records of a thread
#[utoipa::path(
    get,
    path = "/threads/{thread_id}/attachments",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Association records, oldest first"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "threads"
)]
pub async fn list_attachment_records(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<Vec<AttachmentRecordView>>> {
    let records = state
        .chat
        .list_attachment_records(&caller, &thread_id)
        .await?
        .into_iter()
        .map(AttachmentRecordView::from)
        .collect();
    Ok(Json(records))
}

/// Stop any reply still being generated in a thread
#[utoipa::path(
    post,
    path = "/threads/{thread_id}/abort",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Number of generations signalled"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "threads"
)]
pub async fn abort_generation(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<AbortResponse>> {
    let aborted = state.chat.abort_generation(&caller, &thread_id).await?;
    Ok(Json(AbortResponse { aborted }))
}
