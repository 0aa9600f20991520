//! Static model registry.
//!
//! Every model the product offers is enumerated here with the provider that
//! serves it, the upstream model name, pricing and capability flags. The
//! registry is plain data; which providers are actually usable at runtime is
//! decided by [`crate::ProviderRegistry`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::traits::TokenUsage;

/// Upstream model vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Anthropic, Provider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_GENERATIVE_AI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "google" | "gemini" => Ok(Provider::Google),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Price in USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub vision: bool,
    pub pdf: bool,
    pub web_search: bool,
    pub reasoning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub display_name: &'static str,
    pub provider: Provider,
    /// Name sent to the provider API
    pub upstream: &'static str,
    /// OpenAI serves web search through dedicated model variants
    #[serde(skip)]
    pub search_upstream: Option<&'static str>,
    pub pricing: Pricing,
    pub capabilities: Capabilities,
    pub context_window: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4.1")]
    Gpt41,
    #[serde(rename = "o4-mini")]
    O4Mini,
    #[serde(rename = "claude-sonnet-4")]
    ClaudeSonnet4,
    #[serde(rename = "claude-3-5-haiku")]
    Claude35Haiku,
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown model: {0}")]
pub struct UnknownModel(pub String);

const fn caps(vision: bool, pdf: bool, web_search: bool, reasoning: bool) -> Capabilities {
    Capabilities { vision, pdf, web_search, reasoning }
}

const fn price(input_per_million: f64, output_per_million: f64) -> Pricing {
    Pricing { input_per_million, output_per_million }
}

impl ModelId {
    pub const ALL: [ModelId; 8] = [
        ModelId::Gpt4oMini,
        ModelId::Gpt4o,
        ModelId::Gpt41,
        ModelId::O4Mini,
        ModelId::ClaudeSonnet4,
        ModelId::Claude35Haiku,
        ModelId::Gemini25Flash,
        ModelId::Gemini25Pro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4oMini => "gpt-4o-mini",
            ModelId::Gpt4o => "gpt-4o",
            ModelId::Gpt41 => "gpt-4.1",
            ModelId::O4Mini => "o4-mini",
            ModelId::ClaudeSonnet4 => "claude-sonnet-4",
            ModelId::Claude35Haiku => "claude-3-5-haiku",
            ModelId::Gemini25Flash => "gemini-2.5-flash",
            ModelId::Gemini25Pro => "gemini-2.5-pro",
        }
    }

    pub fn spec(&self) -> ModelSpec {
        match self {
            ModelId::Gpt4oMini => ModelSpec {
                display_name: "GPT-4o mini",
                provider: Provider::OpenAI,
                upstream: "gpt-4o-mini",
                search_upstream: Some("gpt-4o-mini-search-preview"),
                pricing: price(0.15, 0.60),
                capabilities: caps(true, true, true, false),
                context_window: 128_000,
            },
            ModelId::Gpt4o => ModelSpec {
                display_name: "GPT-4o",
                provider: Provider::OpenAI,
                upstream: "gpt-4o",
                search_upstream: Some("gpt-4o-search-preview"),
                pricing: price(2.50, 10.00),
                capabilities: caps(true, true, true, false),
                context_window: 128_000,
            },
            ModelId::Gpt41 => ModelSpec {
                display_name: "GPT-4.1",
                provider: Provider::OpenAI,
                upstream: "gpt-4.1",
                search_upstream: None,
                pricing: price(2.00, 8.00),
                capabilities: caps(true, true, false, false),
                context_window: 1_047_576,
            },
            ModelId::O4Mini => ModelSpec {
                display_name: "o4-mini",
                provider: Provider::OpenAI,
                upstream: "o4-mini",
                search_upstream: None,
                pricing: price(1.10, 4.40),
                capabilities: caps(true, true, false, true),
                context_window: 200_000,
            },
            ModelId::ClaudeSonnet4 => ModelSpec {
                display_name: "Claude Sonnet 4",
                provider: Provider::Anthropic,
                upstream: "claude-sonnet-4-20250514",
                search_upstream: None,
                pricing: price(3.00, 15.00),
                capabilities: caps(true, true, true, true),
                context_window: 200_000,
            },
            ModelId::Claude35Haiku => ModelSpec {
                display_name: "Claude 3.5 Haiku",
                provider: Provider::Anthropic,
                upstream: "claude-3-5-haiku-latest",
                search_upstream: None,
                pricing: price(0.80, 4.00),
                capabilities: caps(true, true, true, false),
                context_window: 200_000,
            },
            ModelId::Gemini25Flash => ModelSpec {
                display_name: "Gemini 2.5 Flash",
                provider: Provider::Google,
                upstream: "gemini-2.5-flash",
                search_upstream: None,
                pricing: price(0.30, 2.50),
                capabilities: caps(true, true, false, true),
                context_window: 1_048_576,
            },
            ModelId::Gemini25Pro => ModelSpec {
                display_name: "Gemini 2.5 Pro",
                provider: Provider::Google,
                upstream: "gemini-2.5-pro",
                search_upstream: None,
                pricing: price(1.25, 10.00),
                capabilities: caps(true, true, false, true),
                context_window: 1_048_576,
            },
        }
    }

    pub fn provider(&self) -> Provider {
        self.spec().provider
    }

    /// Upstream model name to call, honoring the web search toggle
    pub fn upstream_for(&self, web_search: bool) -> &'static str {
        let spec = self.spec();
        match (web_search, spec.search_upstream) {
            (true, Some(search)) => search,
            _ => spec.upstream,
        }
    }

    /// Cost of a request in USD
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        let pricing = self.spec().pricing;
        (usage.input_tokens as f64 * pricing.input_per_million
            + usage.output_tokens as f64 * pricing.output_per_million)
            / 1_000_000.0
    }

    pub fn for_provider(provider: Provider) -> impl Iterator<Item = ModelId> {
        Self::ALL.into_iter().filter(move |m| m.provider() == provider)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

impl Default for ModelId {
    fn default() -> Self {
        ModelId::Gpt4oMini
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_every_model() {
        for model in ModelId::ALL {
            assert_eq!(model.as_str().parse::<ModelId>().unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_model() {
        let err = "gpt-9000".parse::<ModelId>().unwrap_err();
        assert_eq!(err, UnknownModel("gpt-9000".to_string()));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ModelId::Gemini25Flash).unwrap();
        assert_eq!(json, "\"gemini-2.5-flash\"");

        let parsed: ModelId = serde_json::from_str("\"claude-sonnet-4\"").unwrap();
        assert_eq!(parsed, ModelId::ClaudeSonnet4);
    }

    #[test]
    fn test_search_variant_only_when_requested() {
        assert_eq!(ModelId::Gpt4o.upstream_for(false), "gpt-4o");
        assert_eq!(ModelId::Gpt4o.upstream_for(true), "gpt-4o-search-preview");
        assert_eq!(ModelId::ClaudeSonnet4.upstream_for(true), "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_cost() {
        let usage = TokenUsage::new(1_000_000, 500_000);
        let cost = ModelId::Gpt4o.cost(&usage);
        assert!((cost - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_every_provider_has_models() {
        for provider in Provider::ALL {
            assert!(ModelId::for_provider(provider).count() > 0);
        }
    }
}
