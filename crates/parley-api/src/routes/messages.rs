use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use parley_agent::{ListMessagesArgs, MessagePage, SendMessageArgs, SendMessageResult};
use parley_client::protocol::{ListMessagesRequest, SendMessageRequest};
use crate::{auth::Auth, error::ApiResult, state::AppState};

/// Send a prompt; the reply is generated in the background
#[utoipa::path(
    post,
    path = "/threads/{thread_id}/messages",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Id of the stored prompt message"),
        (status = 400, description = "Empty prompt, unknown model or bad attachments"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResult>> {
    let args = SendMessageArgs {
        thread_id,
        prompt: req.prompt,
        model_id: req.model_id,
        attachment_ids: req.attachment_ids,
        enable_web_search: req.enable_web_search,
    };
    let result = state.chat.send_message(&caller, args).await?;
    Ok(Json(result))
}

/// Page through a thread's messages, newest first, with optional stream sync
#[utoipa::path(
    post,
    path = "/threads/{thread_id}/messages/list",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "One page of messages"),
        (status = 400, description = "Malformed cursor"),
        (status = 403, description = "Thread belongs to someone else or does not exist")
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(thread_id): Path<String>,
    Json(req): Json<ListMessagesRequest>,
) -> ApiResult<Json<MessagePage>> {
    let args = ListMessagesArgs {
        thread_id,
        pagination_opts: req.pagination_opts,
        stream_args: req.stream_args,
    };
    let page = state.chat.list_messages(&caller, args).await?;
    Ok(Json(page))
}
