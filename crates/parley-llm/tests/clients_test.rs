use futures::StreamExt;
use parley_llm::{
    AnthropicClient, ChatClient, ChatOptions, ChatRequest, Message, OpenAIClient, ProviderError,
    StreamEvent, TokenUsage,
};

async fn collect(client: &dyn ChatClient, request: ChatRequest) -> Vec<StreamEvent> {
    let mut stream = client.chat_stream(request).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }
    events
}

#[tokio::test]
async fn test_openai_stream_against_local_server() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "data: {\"id\":\"1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"id\":\"1\",\"model\":\"gpt-4o\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
        "data: [DONE]\n\n",
    );
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = OpenAIClient::with_base_url("sk-test", server.url(), "OpenAI").unwrap();
    let events = collect(&client, ChatRequest::new("gpt-4o", vec![Message::human("Hi")])).await;

    mock.assert_async().await;
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Message { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello");
    assert!(events.contains(&StreamEvent::Usage { usage: TokenUsage::new(9, 2) }));
    assert_eq!(events.last(), Some(&StreamEvent::Done { finish_reason: None }));
}

#[tokio::test]
async fn test_openai_rate_limit_is_transient() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("{\"error\":{\"message\":\"slow down\"}}")
        .create_async()
        .await;

    let client = OpenAIClient::with_base_url("sk-test", server.url(), "OpenAI").unwrap();
    let err = match client
        .chat_stream(ChatRequest::new("gpt-4o", vec![Message::human("Hi")]))
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    assert!(ProviderError::is_transient_error(&err));
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_anthropic_chat_against_local_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ak-test")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"msg_1","type":"message","role":"assistant","content":[{"type":"text","text":"Hi there"}],"stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":3}}"#,
        )
        .create_async()
        .await;

    let client = AnthropicClient::builder()
        .api_key("ak-test")
        .base_url(server.url())
        .build()
        .unwrap();
    let response = client
        .chat(
            ChatRequest::new("claude-3-5-haiku-latest", vec![Message::human("Hello")])
                .with_options(ChatOptions::new().max_tokens(64)),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.content.as_deref(), Some("Hi there"));
    assert_eq!(response.usage, Some(TokenUsage::new(10, 3)));
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn test_anthropic_bad_request_is_permanent() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(400)
        .with_body(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#)
        .create_async()
        .await;

    let client = AnthropicClient::builder()
        .api_key("ak-test")
        .base_url(server.url())
        .build()
        .unwrap();
    let err = client
        .chat(ChatRequest::new("claude-3-5-haiku-latest", vec![Message::human("Hello")]))
        .await
        .unwrap_err();

    assert!(!ProviderError::is_transient_error(&err));
}
