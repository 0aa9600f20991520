use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley_agent::{ChatSettings, GenerationConfig, UploadSettings};
use parley_llm::{ModelId, Provider};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadSettings,
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds before a request is cut off
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default = "default_database")]
    pub database: String,
    /// Directory for uploaded bytes; kept in memory when unset
    #[serde(default)]
    pub files_dir: Option<String>,
}

fn default_database() -> String {
    "parley".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub default_model: ModelId,
    pub enabled_providers: Vec<Provider>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_history_limit() -> usize {
    50
}

impl LlmConfig {
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            default_model: self.default_model,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            history_limit: self.history_limit,
            system_prompt: self.system_prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `PARLEY_` environment variables, `__` between levels
    ///    (e.g. `PARLEY_SERVER__PORT=9000`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("llm.enabled_providers")
                    .with_list_parse_key("cors.origins"),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.load_secrets()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }

    /// Secrets never come from files
    fn load_secrets(&mut self) -> Result<(), ConfigError> {
        self.uploads.url_secret = std::env::var("PARLEY_URL_SECRET").map_err(|_| {
            ConfigError::Message("PARLEY_URL_SECRET environment variable is required".to_string())
        })?;
        if self.storage.backend == StorageBackend::Mongodb {
            self.mongodb_uri = std::env::var("MONGODB_URI").map_err(|_| {
                ConfigError::Message("MONGODB_URI environment variable is required".to_string())
            })?;
        }
        Ok(())
    }
}
