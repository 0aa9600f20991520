use mockito::Matcher;
use parley_client::protocol::SendMessageRequest;
use parley_client::{ApiClient, ClientError, MessageCache, Navigation, Route, UploadRejection, UploadState, UploadTracker};

const THREAD_UUID: &str = "7f1d6a3e-2b1c-4d5e-9f00-123456789abc";

fn thread_json(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","uuid":"{THREAD_UUID}","title":"New Chat","status":"active","createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:00:00Z"}}"#
    )
}

#[tokio::test]
async fn test_sign_in_keeps_token() {
    let mut server = mockito::Server::new_async().await;
    let signin = server
        .mock("POST", "/auth/signin")
        .match_body(Matcher::Json(serde_json::json!({"name": "ada"})))
        .with_status(200)
        .with_body(r#"{"token":"tok-1","userId":"u1","name":"ada"}"#)
        .create_async()
        .await;
    let threads = server
        .mock("GET", "/threads/t1")
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_body(thread_json("t1"))
        .create_async()
        .await;

    let mut client = ApiClient::new(server.url()).unwrap();
    assert!(!client.is_authenticated());
    let session = client.sign_in("ada").await.unwrap();
    assert_eq!(session.user_id, "u1");
    assert!(client.is_authenticated());

    let thread = client.get_thread("t1").await.unwrap();
    assert_eq!(thread.title, "New Chat");

    signin.assert_async().await;
    threads.assert_async().await;
}

#[tokio::test]
async fn test_error_body_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/threads/t1/messages")
        .with_status(400)
        .with_body(r#"{"error":"Message cannot be empty","kind":"validation"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    let err = client
        .send_message("t1", &SendMessageRequest::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, kind, message } => {
            assert_eq!(status, 400);
            assert_eq!(kind, "validation");
            assert_eq!(message, "Message cannot be empty");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_send_rolls_back_optimistic_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/threads/t1/messages")
        .with_status(403)
        .with_body(r#"{"error":"Unauthorized","kind":"unauthorized"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    let mut cache = MessageCache::new();
    let body = SendMessageRequest {
        prompt: "Hello".into(),
        ..Default::default()
    };

    assert!(client.send_optimistic(&mut cache, "t1", &body, 1).await.is_err());
    assert!(cache.messages("t1").is_empty());
    assert!(!cache.has_pending("t1"));
}

#[tokio::test]
async fn test_successful_send_then_refresh_replaces_optimistic() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/threads/t1/messages")
        .with_status(200)
        .with_body(r#"{"messageId":"m1"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/threads/t1/messages/list")
        .match_body(Matcher::PartialJson(serde_json::json!({"paginationOpts": {"numItems": 20}})))
        .with_status(200)
        .with_body(
            r#"{"page":[{"id":"m1","order":0,"role":"user","text":"Hello","status":"success","createdAt":5}],"isDone":true,"continueCursor":""}"#,
        )
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    let mut cache = MessageCache::new();
    let body = SendMessageRequest {
        prompt: "Hello".into(),
        ..Default::default()
    };

    let result = client.send_optimistic(&mut cache, "t1", &body, 1).await.unwrap();
    assert_eq!(result.message_id, "m1");
    assert!(cache.has_pending("t1"));

    client.refresh(&mut cache, "t1", 20).await.unwrap();
    let messages = cache.messages("t1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m1");
    assert!(!cache.has_pending("t1"));
}

#[tokio::test]
async fn test_oversized_upload_never_hits_the_network() {
    let mut server = mockito::Server::new_async().await;
    let url_mock = server
        .mock("POST", "/uploads/url")
        .expect(0)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    let mut tracker = UploadTracker::new();
    let bytes = vec![0u8; 25 * 1024 * 1024];

    let err = client
        .upload_file(&mut tracker, "huge.png", "image/png", bytes)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Upload(UploadRejection::TooLarge { size }) if size == 25 * 1024 * 1024
    ));
    assert!(tracker.entries().is_empty());
    url_mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_flow_swaps_temp_id() {
    let mut server = mockito::Server::new_async().await;
    let upload_url = format!("{}/upload/tok-123", server.url());
    server
        .mock("POST", "/uploads/url")
        .with_status(200)
        .with_body(format!(r#"{{"uploadUrl":"{upload_url}"}}"#))
        .create_async()
        .await;
    let upload = server
        .mock("POST", "/upload/tok-123")
        .match_header("content-type", "text/plain")
        .match_body("hello")
        .with_status(200)
        .with_body(r#"{"storageId":"file-1"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    let mut tracker = UploadTracker::new();
    let storage_id = client
        .upload_file(&mut tracker, "notes.txt", "text/plain", b"hello".to_vec())
        .await
        .unwrap();

    assert_eq!(storage_id, "file-1");
    assert_eq!(tracker.ready_ids(), vec!["file-1"]);
    assert_eq!(tracker.entries()[0].state, UploadState::Ready);
    upload.assert_async().await;
}

#[tokio::test]
async fn test_navigation_resolves_threads() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/threads/by-uuid/{THREAD_UUID}").as_str())
        .with_status(404)
        .with_body(r#"{"error":"Thread not found","kind":"not_found"}"#)
        .create_async()
        .await;

    let anonymous = ApiClient::new(server.url()).unwrap();
    assert_eq!(
        anonymous.navigate("/chat").await.unwrap(),
        Navigation::Redirect("/signin".into())
    );

    let client = anonymous.with_token("tok");
    assert_eq!(
        client.navigate("/chat").await.unwrap(),
        Navigation::Render(Route::ChatIndex)
    );
    assert_eq!(
        client.navigate(&format!("/chat/{THREAD_UUID}")).await.unwrap(),
        Navigation::Redirect("/chat".into())
    );
}

#[tokio::test]
async fn test_latest_thread_missing_is_none() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/threads/latest")
        .with_status(404)
        .with_body(r#"{"error":"No threads yet","kind":"not_found"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(server.url()).unwrap().with_token("tok");
    assert_eq!(client.latest_thread().await.unwrap(), None);
}

#[test]
fn test_rejects_relative_base_url() {
    assert!(matches!(
        ApiClient::new("localhost:8000"),
        Err(ClientError::InvalidUrl(_))
    ));
}
