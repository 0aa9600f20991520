use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use parley_api::{build_router, config::Config, state::AppState};
use parley_llm::traits::EventStream;
use parley_llm::{ChatClient, ChatRequest, ChatResponse, Provider, ProviderRegistry, StreamEvent};
use parley_persist::{MemoryBlobStore, MemoryPersistenceClient};
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE_URL: &str = "http://localhost:8000";

/// Replies "Hi there" to every prompt
struct EchoClient;

#[async_trait]
impl ChatClient for EchoClient {
    async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
        unimplemented!("only streaming is used")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> anyhow::Result<EventStream> {
        let events = vec![
            Ok(StreamEvent::Message { content: "Hi ".to_string() }),
            Ok(StreamEvent::Message { content: "there".to_string() }),
            Ok(StreamEvent::Done { finish_reason: Some("stop".to_string()) }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

fn test_config() -> Config {
    let mut config: Config = toml::from_str(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0

        [cors]
        enabled = false
        origins = []

        [storage]
        backend = "memory"

        [llm]
        default_model = "gpt-4o-mini"
        enabled_providers = ["openai"]

        [generation]
        backoff_ms = 1
        flush_chars = 4
        flush_interval_ms = 10

        [logging]
        level = "debug"
        format = "pretty"
        "#,
    )
    .unwrap();
    config.uploads.url_secret = "test-secret".to_string();
    config
}

fn app() -> Router {
    let registry = ProviderRegistry::new().with_client(Provider::OpenAI, Arc::new(EchoClient));
    let state = AppState::with_parts(
        test_config(),
        Arc::new(MemoryPersistenceClient::new()),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(registry),
    );
    build_router(Arc::new(state))
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn sign_in(app: &Router, name: &str) -> String {
    let (status, body) = call(app, "POST", "/auth/signin", None, Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create_thread(app: &Router, token: &str) -> (String, String) {
    let (status, body) = call(app, "POST", "/threads", Some(token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["threadId"].as_str().unwrap().to_string(),
        body["uuid"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_thread_routes_require_sign_in() {
    let app = app();
    let (status, body) = call(&app, "GET", "/threads", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, _) = call(&app, "GET", "/threads", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_list_and_group_threads() {
    let app = app();
    let token = sign_in(&app, "ada").await;

    let (status, _) = call(&app, "GET", "/threads/latest", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (thread_id, uuid) = create_thread(&app, &token).await;

    let (status, body) = call(&app, "GET", "/threads?tzOffsetMinutes=120", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["threads"][0]["id"], thread_id.as_str());
    assert_eq!(body["threads"][0]["title"], "New Chat");
    assert_eq!(body["groups"][0]["label"], "Today");
    assert_eq!(body["groups"][0]["threads"][0]["id"], thread_id.as_str());

    let (status, body) = call(&app, "GET", &format!("/threads/by-uuid/{uuid}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], thread_id.as_str());

    let (status, body) = call(&app, "GET", "/threads/latest", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], uuid.as_str());
}

#[tokio::test]
async fn test_other_users_thread_is_forbidden() {
    let app = app();
    let owner = sign_in(&app, "ada").await;
    let intruder = sign_in(&app, "eve").await;
    let (thread_id, uuid) = create_thread(&app, &owner).await;

    let (status, body) = call(&app, "GET", &format!("/threads/{thread_id}"), Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&intruder),
        Some(json!({"prompt": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "GET", &format!("/threads/by-uuid/{uuid}"), Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_archive_and_delete() {
    let app = app();
    let token = sign_in(&app, "ada").await;
    let (thread_id, _) = create_thread(&app, &token).await;
    let path = format!("/threads/{thread_id}");

    let (status, body) = call(
        &app,
        "PATCH",
        &path,
        Some(&token),
        Some(json!({"title": "Trip plans", "status": "archived"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Trip plans");
    assert_eq!(body["status"], "archived");

    let (status, body) = call(&app, "PATCH", &path, Some(&token), Some(json!({"title": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = call(&app, "DELETE", &path, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &path, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_send_message_and_read_reply() {
    let app = app();
    let token = sign_in(&app, "ada").await;
    let (thread_id, _) = create_thread(&app, &token).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({"prompt": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({"prompt": "Hello", "modelId": "gpt-9"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown model: gpt-9");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({"prompt": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = body["messageId"].as_str().unwrap().to_string();

    let list_path = format!("/threads/{thread_id}/messages/list");
    let mut page = Value::Null;
    for _ in 0..300 {
        let (status, body) = call(
            &app,
            "POST",
            &list_path,
            Some(&token),
            Some(json!({"paginationOpts": {"numItems": 10}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        if body["page"].as_array().map(Vec::len) == Some(2) {
            page = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(page["isDone"], true);
    assert_eq!(page["page"][0]["role"], "assistant");
    assert_eq!(page["page"][0]["text"], "Hi there");
    assert_eq!(page["page"][1]["id"], message_id.as_str());
    assert_eq!(page["page"][1]["text"], "Hello");

    let (_, thread) = call(&app, "GET", &format!("/threads/{thread_id}"), Some(&token), None).await;
    assert_eq!(thread["title"], "Hello");

    let (status, records) = call(&app, "GET", &format!("/threads/{thread_id}/attachments"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn test_upload_meta_and_signed_download() {
    let app = app();
    let token = sign_in(&app, "ada").await;

    let (status, body) = call(&app, "POST", "/uploads/url", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let upload_url = body["uploadUrl"].as_str().unwrap();
    let upload_path = upload_url.strip_prefix(BASE_URL).unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri(&upload_path)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello world"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let storage_id = body["storageId"].as_str().unwrap().to_string();

    // upload URLs are single use
    let request = Request::builder()
        .method("POST")
        .uri(&upload_path)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("again"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, meta) = call(&app, "GET", &format!("/files/{storage_id}/meta"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["contentType"], "text/plain");
    assert_eq!(meta["size"], 11);

    let other = sign_in(&app, "eve").await;
    let (status, meta_for_other) = call(&app, "GET", &format!("/files/{storage_id}/meta"), Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta_for_other, Value::Null);

    let download_path = meta["url"].as_str().unwrap().strip_prefix(BASE_URL).unwrap().to_string();
    let response = app
        .clone()
        .oneshot(Request::builder().uri(&download_path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello world");

    let (status, _) = call(&app, "GET", &format!("/files/{storage_id}?sig=forged"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let app = app();
    let token = sign_in(&app, "ada").await;
    let (_, body) = call(&app, "POST", "/uploads/url", Some(&token), None).await;
    let upload_path = body["uploadUrl"].as_str().unwrap().strip_prefix(BASE_URL).unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri(&upload_path)
        .header(header::CONTENT_TYPE, "application/x-msdownload")
        .body(Body::from("MZ"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_models_listing_and_openapi() {
    let app = app();
    let (status, body) = call(&app, "GET", "/models", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["defaultModel"], "gpt-4o-mini");
    let models = body["models"].as_array().unwrap();
    assert!(models.iter().all(|m| m["provider"] == "openai"));
    assert!(models.iter().any(|m| m["id"] == "gpt-4o-mini" && m["isDefault"] == true));

    let (status, doc) = call(&app, "GET", "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/threads/{thread_id}/messages"].is_object());
}
