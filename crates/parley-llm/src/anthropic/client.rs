// Anthropic Messages API client
//
// Differs from the OpenAI shape in a few ways:
// - Auth header: x-api-key plus a pinned anthropic-version
// - System prompt is a top-level field, not a message
// - max_tokens is mandatory
// - Stream events are typed (message_start, content_block_delta, message_delta, ...)

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::streaming::StreamEvent;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Content, ContentPart, Message};
use crate::ProviderError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    fn build_request(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let mut system = Vec::new();
        let mut turns = Vec::new();

        for message in messages {
            match message {
                Message::System { content } => system.push(content.text_lossy()),
                Message::Human { content } => turns.push(json!({
                    "role": "user",
                    "content": convert_content(content),
                })),
                Message::AI { content } => turns.push(json!({
                    "role": "assistant",
                    "content": content.text_lossy(),
                })),
            }
        }

        let mut request = json!({
            "model": model,
            "messages": turns,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        let Some(obj) = request.as_object_mut() else {
            return request;
        };

        if !system.is_empty() {
            obj.insert("system".to_string(), json!(system.join("\n\n")));
        }
        if let Some(temp) = options.temperature {
            // Anthropic accepts 0.0..=1.0
            obj.insert("temperature".to_string(), json!(temp.clamp(0.0, 1.0)));
        }
        if options.web_search {
            obj.insert(
                "tools".to_string(),
                json!([{ "type": "web_search_20250305", "name": "web_search", "max_uses": 5 }]),
            );
        }

        request
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(ProviderError::Http)
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: "Anthropic",
                status,
                body,
            }
            .into());
        }

        Ok(response)
    }
}

fn convert_content(content: Content) -> Value {
    match content {
        Content::Text(s) => json!(s),
        Content::Parts(parts) => {
            let converted: Vec<Value> = parts
                .into_iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { media_type, data } => json!({
                        "type": "image",
                        "source": { "type": "base64", "media_type": media_type, "data": data },
                    }),
                    ContentPart::Document { media_type, data, .. } => json!({
                        "type": "document",
                        "source": { "type": "base64", "media_type": media_type, "data": data },
                    }),
                })
                .collect();
            json!(converted)
        }
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_request(&request.model, request.messages, &request.options, false);
        let response = self.post(&payload).await?;

        let raw: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let text: String = raw
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Other => None,
            })
            .collect();

        Ok(ChatResponse {
            content: (!text.is_empty()).then_some(text),
            usage: Some(TokenUsage::new(raw.usage.input_tokens, raw.usage.output_tokens)),
            finish_reason: raw.stop_reason,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_request(&request.model, request.messages, &request.options, true);
        let response = self.post(&payload).await?;

        tracing::debug!(provider = "Anthropic", model = %request.model, "chat stream opened");
        Ok(parse_sse_stream(response, MessagesEventParser::default()))
    }
}

/// Builder so tests can point the client at a local server
#[derive(Default)]
pub struct AnthropicClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl AnthropicClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<AnthropicClient> {
        let api_key = self.api_key.ok_or_else(|| anyhow!("api_key is required"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(AnthropicClient {
            http_client,
            base_url: self
                .base_url
                .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Stream parser; input tokens arrive in `message_start`, output tokens in `message_delta`
#[derive(Default)]
struct MessagesEventParser {
    input_tokens: AtomicU32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagesStreamEvent {
    MessageStart { message: StartMessage },
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { delta: MessageDeltaBody, usage: Option<OutputUsage> },
    MessageStop,
    Error { error: ApiErrorBody },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    usage: Option<InputUsage>,
}

#[derive(Debug, Deserialize)]
struct InputUsage {
    input_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OutputUsage {
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl SseLineParser for MessagesEventParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let event: MessagesStreamEvent = serde_json::from_str(data)
            .map_err(|e| ProviderError::Decode(format!("messages event: {}", e)))?;

        let events = match event {
            MessagesStreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.input_tokens.store(usage.input_tokens, Ordering::Relaxed);
                }
                vec![]
            }
            MessagesStreamEvent::ContentBlockDelta { delta: BlockDelta::TextDelta { text } } => {
                if text.is_empty() {
                    vec![]
                } else {
                    vec![StreamEvent::Message { content: text }]
                }
            }
            MessagesStreamEvent::ContentBlockDelta { delta: BlockDelta::Other } => vec![],
            MessagesStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(usage) = usage {
                    let input = self.input_tokens.load(Ordering::Relaxed);
                    events.push(StreamEvent::Usage {
                        usage: TokenUsage::new(input, usage.output_tokens),
                    });
                }
                if delta.stop_reason.is_some() {
                    events.push(StreamEvent::Done {
                        finish_reason: delta.stop_reason,
                    });
                }
                events
            }
            MessagesStreamEvent::MessageStop => vec![StreamEvent::Done { finish_reason: None }],
            MessagesStreamEvent::Error { error } => {
                // overloaded_error / api_error mid-stream are worth retrying
                return Err(ProviderError::Stream(format!("{}: {}", error.kind, error.message)).into());
            }
            MessagesStreamEvent::Ignored => vec![],
        };

        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}
