mod client;

pub use client::{AnthropicClient, AnthropicClientBuilder, ANTHROPIC_API_BASE};
