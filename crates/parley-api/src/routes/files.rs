use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use parley_agent::FileForAi;
use parley_client::protocol::{UploadResponse, UploadUrlResponse};
use crate::{
    auth::Auth,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub sig: String,
}

/// Issue a single-use upload URL
#[utoipa::path(
    post,
    path = "/uploads/url",
    responses(
        (status = 200, description = "Upload URL"),
        (status = 401, description = "Not signed in")
    ),
    tag = "files"
)]
pub async fn generate_upload_url(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
) -> ApiResult<Json<UploadUrlResponse>> {
    let upload_url = state.files.generate_upload_url(&caller).await?;
    Ok(Json(UploadUrlResponse { upload_url }))
}

/// Receive the raw bytes of a file at its upload URL
#[utoipa::path(
    post,
    path = "/upload/{token}",
    params(
        ("token" = String, Path, description = "Upload token from the issued URL")
    ),
    responses(
        (status = 200, description = "Storage id of the file"),
        (status = 400, description = "Unsupported type, empty or too large"),
        (status = 403, description = "Token unknown, used or expired")
    ),
    tag = "files"
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header is required".to_string()))?;
    let storage_id = state
        .files
        .store_upload(&token, content_type, body.to_vec())
        .await?;
    Ok(Json(UploadResponse { storage_id }))
}

/// File metadata and a signed URL; null for unknown or foreign files
#[utoipa::path(
    get,
    path = "/files/{storage_id}/meta",
    params(
        ("storage_id" = String, Path, description = "Storage id")
    ),
    responses(
        (status = 200, description = "File details or null"),
        (status = 401, description = "Not signed in")
    ),
    tag = "files"
)]
pub async fn file_meta(
    State(state): State<Arc<AppState>>,
    Auth(caller): Auth,
    Path(storage_id): Path<String>,
) -> ApiResult<Json<Option<FileForAi>>> {
    let file = state.files.get_file_for_ai(&caller, &storage_id).await?;
    Ok(Json(file))
}

/// Download the bytes behind a signed URL
#[utoipa::path(
    get,
    path = "/files/{storage_id}",
    params(
        ("storage_id" = String, Path, description = "Storage id"),
        ("sig" = String, Query, description = "URL signature")
    ),
    responses(
        (status = 200, description = "File bytes"),
        (status = 403, description = "Bad signature"),
        (status = 404, description = "Unknown file")
    ),
    tag = "files"
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(storage_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let (file, bytes) = state.files.download(&storage_id, &query.sig).await?;
    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
