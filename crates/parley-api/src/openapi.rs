use axum::Json;
use utoipa::OpenApi;

use crate::routes::{auth, files, health, messages, models, threads};

#[derive(OpenApi)]
#[openapi(
    info(title = "Parley API", description = "Chat threads, messages, uploads and models"),
    paths(
        health::health_check,
        auth::sign_in,
        threads::create_thread,
        threads::list_threads,
        threads::latest_thread,
        threads::thread_by_uuid,
        threads::get_thread,
        threads::update_thread,
        threads::delete_thread,
        threads::list_attachment_records,
        threads::abort_generation,
        messages::send_message,
        messages::list_messages,
        files::generate_upload_url,
        files::upload,
        files::file_meta,
        files::download,
        models::list_models,
    ),
    components(schemas(health::HealthResponse)),
    tags(
        (name = "health"),
        (name = "auth"),
        (name = "threads"),
        (name = "messages"),
        (name = "files"),
        (name = "models"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
