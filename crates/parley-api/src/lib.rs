//! HTTP surface of Parley
//!
//! [`build_router`] wires every route over a shared [`state::AppState`];
//! the binary adds configuration loading and logging.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::CorsConfig;
use crate::routes::{auth as signin, files, health, messages, models, threads};
use crate::state::AppState;

/// Room for request framing on top of the largest accepted file
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.uploads.max_bytes as usize + UPLOAD_BODY_SLACK;

    let api_routes = Router::new()
        // Health & docs
        .route("/health", get(health::health_check))
        .route("/api/openapi.json", get(openapi::openapi_json))
        // Auth
        .route("/auth/signin", post(signin::sign_in))
        // Threads
        .route("/threads", post(threads::create_thread).get(threads::list_threads))
        .route("/threads/latest", get(threads::latest_thread))
        .route("/threads/by-uuid/:uuid", get(threads::thread_by_uuid))
        .route(
            "/threads/:thread_id",
            get(threads::get_thread)
                .patch(threads::update_thread)
                .delete(threads::delete_thread),
        )
        .route("/threads/:thread_id/attachments", get(threads::list_attachment_records))
        .route("/threads/:thread_id/abort", post(threads::abort_generation))
        // Messages
        .route("/threads/:thread_id/messages", post(messages::send_message))
        .route("/threads/:thread_id/messages/list", post(messages::list_messages))
        // Files
        .route("/uploads/url", post(files::generate_upload_url))
        .route(
            "/upload/:token",
            post(files::upload)
                .put(files::upload)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/:storage_id/meta", get(files::file_meta))
        .route("/files/:storage_id", get(files::download))
        // Models
        .route("/models", get(models::list_models));

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    api_routes
        .layer(axum::middleware::from_fn(middleware::logging::log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        return CorsLayer::permissive();
    }

    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let parsed_origins: Vec<axum::http::HeaderValue> = config
            .origins
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();

        cors.allow_origin(parsed_origins)
    }
}
