// OpenAI-compatible chat completions client (OpenAI, and Google via its compat endpoint)

use crate::buffer_utils::parse_sse_stream;
use crate::streaming::ChatChunkParser;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Content, ContentPart, Message};
use crate::ProviderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GOOGLE_OPENAI_COMPAT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// HTTP client for `/chat/completions` style APIs (no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
    provider_name: &'static str,
}

impl OpenAIClient {
    /// Create new client against api.openai.com
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_API_BASE, "OpenAI")
    }

    /// Gemini models through Google's OpenAI-compatible endpoint
    pub fn google(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, GOOGLE_OPENAI_COMPAT_BASE, "Google")
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        provider_name: &'static str,
    ) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider_name,
        })
    }

    /// Build chat completion request payload
    fn build_chat_request(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let messages: Vec<Value> = messages.into_iter().map(convert_message).collect();

        let mut request = json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });

        let Some(obj) = request.as_object_mut() else {
            return request;
        };

        // o-series and search-preview models reject sampling parameters
        let fixed_sampling = model.starts_with('o') || model.contains("search");

        if stream {
            obj.insert("stream_options".to_string(), json!({ "include_usage": true }));
        }
        if let Some(temp) = options.temperature {
            if !fixed_sampling {
                obj.insert("temperature".to_string(), json!(temp));
            }
        }
        if let Some(max_tokens) = options.max_tokens {
            let token_field = if model.starts_with('o') {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            obj.insert(token_field.to_string(), json!(max_tokens));
        }
        if options.web_search && model.contains("search") {
            obj.insert("web_search_options".to_string(), json!({}));
        }

        request
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(ProviderError::Http)
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.provider_name,
                status,
                body,
            }
            .into());
        }

        Ok(response)
    }
}

fn convert_message(message: Message) -> Value {
    let role = message.role().to_string();
    let content = match message {
        Message::System { content } | Message::AI { content } => json!(content.text_lossy()),
        Message::Human { content } => convert_content(content),
    };
    json!({ "role": role, "content": content })
}

/// Convert Content to OpenAI format (string or array of parts)
fn convert_content(content: Content) -> Value {
    match content {
        Content::Text(s) => json!(s),
        Content::Parts(parts) => {
            let converted: Vec<Value> = parts
                .into_iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { media_type, data } => json!({
                        "type": "image_url",
                        "image_url": { "url": ContentPart::data_url(&media_type, &data) },
                    }),
                    ContentPart::Document { media_type, filename, data } => json!({
                        "type": "file",
                        "file": {
                            "filename": filename.unwrap_or_else(|| "attachment.pdf".to_string()),
                            "file_data": ContentPart::data_url(&media_type, &data),
                        },
                    }),
                })
                .collect();
            json!(converted)
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_chat_request(&request.model, request.messages, &request.options, false);
        let response = self.post(&payload).await?;

        let raw: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let choice = raw.choices.into_iter().next();
        Ok(ChatResponse {
            content: choice.as_ref().and_then(|c| c.message.content.clone()),
            usage: raw
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            finish_reason: choice.and_then(|c| c.finish_reason),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = self.build_chat_request(&request.model, request.messages, &request.options, true);
        let response = self.post(&payload).await?;

        tracing::debug!(provider = self.provider_name, model = %request.model, "chat stream opened");
        Ok(parse_sse_stream(response, ChatChunkParser))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAIClient {
        OpenAIClient::new("test-key").unwrap()
    }

    #[test]
    fn test_payload_for_chat_model() {
        let options = ChatOptions::new().temperature(0.3).max_tokens(256);
        let payload = client().build_chat_request("gpt-4o", vec![Message::human("Hi")], &options, true);

        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["temperature"], json!(0.3f32));
        assert_eq!(payload["max_tokens"], 256);
        assert_eq!(payload["stream_options"]["include_usage"], true);
        assert!(payload.get("web_search_options").is_none());
    }

    #[test]
    fn test_payload_for_reasoning_model() {
        let options = ChatOptions::new().temperature(0.3).max_tokens(256);
        let payload = client().build_chat_request("o4-mini", vec![Message::human("Hi")], &options, false);

        assert!(payload.get("temperature").is_none());
        assert_eq!(payload["max_completion_tokens"], 256);
    }

    #[test]
    fn test_payload_for_search_model() {
        let options = ChatOptions::new().temperature(0.3).web_search(true);
        let payload = client().build_chat_request("gpt-4o-search-preview", vec![Message::human("news?")], &options, false);

        assert_eq!(payload["web_search_options"], json!({}));
        assert!(payload.get("temperature").is_none());
    }

    #[test]
    fn test_image_part_becomes_data_url() {
        let content = Content::Parts(vec![
            ContentPart::text("What is this?"),
            ContentPart::Image { media_type: "image/png".to_string(), data: "AAAA".to_string() },
        ]);
        let value = convert_content(content);

        assert_eq!(value[0]["type"], "text");
        assert_eq!(value[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
