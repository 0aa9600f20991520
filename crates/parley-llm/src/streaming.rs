use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::buffer_utils::SseLineParser;
use crate::traits::TokenUsage;

/// Provider-agnostic streaming event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Assistant text delta
    Message {
        content: String,
    },

    Usage {
        usage: TokenUsage,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

// ============================================================================
// OPENAI-COMPATIBLE CHAT COMPLETION CHUNKS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }

    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        // With stream_options.include_usage the last chunk has no choices
        if let Some(usage) = &self.usage {
            events.push(StreamEvent::Usage {
                usage: TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            });
        }

        events
    }
}

/// Parses `data:` lines of an OpenAI-compatible chat completion stream
pub struct ChatChunkParser;

impl SseLineParser for ChatChunkParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let chunk: ChatStreamChunk = serde_json::from_str(data)
            .map_err(|e| crate::ProviderError::Decode(format!("chat chunk: {}", e)))?;
        Ok(chunk.to_stream_events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_with_content_and_finish() {
        let data = r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":"stop"}]}"#;
        let events = ChatChunkParser.parse_data_line(data).unwrap();

        assert_eq!(
            events,
            vec![
                StreamEvent::Message { content: "Hi".to_string() },
                StreamEvent::Done { finish_reason: Some("stop".to_string()) },
            ]
        );
    }

    #[test]
    fn test_usage_only_chunk() {
        let data = r#"{"id":"c1","model":"gpt-4o","choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#;
        let events = ChatChunkParser.parse_data_line(data).unwrap();

        assert_eq!(
            events,
            vec![StreamEvent::Usage { usage: TokenUsage::new(12, 3) }]
        );
    }

    #[test]
    fn test_empty_delta_is_skipped() {
        let data = r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#;
        assert!(ChatChunkParser.parse_data_line(data).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_chunk_is_error() {
        assert!(ChatChunkParser.parse_data_line("{not json").is_err());
    }
}
