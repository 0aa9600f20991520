pub mod types;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod error;
pub mod models;
pub mod config;
pub mod openai;
pub mod anthropic;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenUsage};
pub use streaming::StreamEvent;
pub use error::ProviderError;
pub use models::{Capabilities, ModelId, ModelSpec, Pricing, Provider, UnknownModel};
pub use config::{ModelHandle, ProviderConfig, ProviderRegistry};
pub use openai::OpenAIClient;
pub use anthropic::AnthropicClient;
pub use types::{Message, Content, ContentPart};
