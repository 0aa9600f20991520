use parley_llm::ModelId;
use serde::Deserialize;

/// Model defaults applied to every generation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub default_model: ModelId,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Messages of history sent upstream, newest kept
    pub history_limit: usize,
    pub system_prompt: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: ModelId::default(),
            temperature: Some(0.7),
            max_output_tokens: None,
            history_limit: 50,
            system_prompt: None,
        }
    }
}

/// Background worker tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_concurrency: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// Pending characters that force a delta write
    pub flush_chars: usize,
    /// Longest a pending delta waits before it is written
    pub flush_interval_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            queue_capacity: 1024,
            max_attempts: 3,
            backoff_ms: 500,
            flush_chars: 64,
            flush_interval_ms: 250,
        }
    }
}

impl GenerationConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        std::time::Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Upload URL issuing and file URL signing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub public_base_url: String,
    pub url_ttl_secs: u64,
    pub max_bytes: u64,
    /// Signs file URLs; loaded from `PARLEY_URL_SECRET`, never from files
    #[serde(skip)]
    pub url_secret: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000".to_string(),
            url_ttl_secs: 3600,
            max_bytes: parley_persist::MAX_UPLOAD_BYTES,
            url_secret: String::new(),
        }
    }
}
