mod client;

pub use client::{OpenAIClient, GOOGLE_OPENAI_COMPAT_BASE, OPENAI_API_BASE};
