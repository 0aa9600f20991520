// Provider configuration and resolution
//
// The registry is built once at startup and never mutated afterwards; a
// config reload builds a new registry and swaps the Arc.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::anthropic::AnthropicClient;
use crate::models::{ModelId, ModelSpec, Provider};
use crate::openai::OpenAIClient;
use crate::traits::ChatClient;
use crate::ProviderError;

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Overrides the vendor endpoint (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Read the provider's API key from the environment
    ///
    /// Missing or blank keys fail fast instead of surfacing later as 401s.
    pub fn from_env(provider: Provider) -> std::result::Result<Self, ProviderError> {
        let var = provider.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(provider, key.trim())),
            _ => Err(ProviderError::MissingCredentials(var)),
        }
    }

    /// Create the client for this provider
    pub fn create_client(&self) -> Result<Arc<dyn ChatClient>> {
        let client: Arc<dyn ChatClient> = match (self.provider, &self.base_url) {
            (Provider::OpenAI, None) => Arc::new(OpenAIClient::new(&self.api_key)?),
            (Provider::OpenAI, Some(url)) => {
                Arc::new(OpenAIClient::with_base_url(&self.api_key, url, "OpenAI")?)
            }
            (Provider::Google, None) => Arc::new(OpenAIClient::google(&self.api_key)?),
            (Provider::Google, Some(url)) => {
                Arc::new(OpenAIClient::with_base_url(&self.api_key, url, "Google")?)
            }
            (Provider::Anthropic, url) => {
                let mut builder = AnthropicClient::builder().api_key(&self.api_key);
                if let Some(url) = url {
                    builder = builder.base_url(url);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(client)
    }
}

/// A model bound to the client that serves it
#[derive(Clone)]
pub struct ModelHandle {
    pub id: ModelId,
    pub spec: ModelSpec,
    pub client: Arc<dyn ChatClient>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.id)
            .field("provider", &self.spec.provider)
            .finish()
    }
}

/// Immutable map from provider to client
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<Provider, Arc<dyn ChatClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for the enabled providers, reading keys from the environment
    pub fn from_env(enabled: &[Provider]) -> Result<Self> {
        let configs = enabled
            .iter()
            .map(|p| ProviderConfig::from_env(*p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_configs(configs)
    }

    pub fn from_configs(configs: impl IntoIterator<Item = ProviderConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            let client = config.create_client()?;
            registry = registry.with_client(config.provider, client);
        }
        Ok(registry)
    }

    pub fn with_client(mut self, provider: Provider, client: Arc<dyn ChatClient>) -> Self {
        tracing::debug!(provider = %provider, "registered provider client");
        self.clients.insert(provider, client);
        self
    }

    /// Resolve the client serving a provider
    pub fn resolve(&self, provider: Provider) -> std::result::Result<Arc<dyn ChatClient>, ProviderError> {
        self.clients
            .get(&provider)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(provider.to_string()))
    }

    /// Bind a model to its provider's client
    pub fn model(&self, id: ModelId) -> std::result::Result<ModelHandle, ProviderError> {
        let spec = id.spec();
        let client = self.resolve(spec.provider)?;
        Ok(ModelHandle { id, spec, client })
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// Models whose provider is configured, in registry order
    pub fn available_models(&self) -> Vec<ModelId> {
        ModelId::ALL
            .into_iter()
            .filter(|m| self.is_enabled(m.provider()))
            .collect()
    }
}
