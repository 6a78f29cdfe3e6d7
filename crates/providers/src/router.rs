//! Provider router — builds named providers from config.
//!
//! A provider name resolves to an endpoint (family, base URL, key, model).
//! The family picks the adapter and transport; nothing here switches on
//! the vendor name beyond looking up default URLs.

use std::collections::BTreeMap;
use std::sync::Arc;

use forgeloop_config::{AppConfig, family_for};
use forgeloop_core::error::ProviderError;
use forgeloop_core::provider::{Provider, ProviderFamily};
use tracing::debug;

use crate::anthropic::{self, AnthropicTransport};
use crate::block_content::BlockContentAdapter;
use crate::function_call::FunctionCallAdapter;
use crate::openai_compat::OpenAiCompatTransport;

/// Connection settings for one named provider.
#[derive(Clone)]
pub struct Endpoint {
    pub family: ProviderFamily,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("family", &self.family)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Resolves provider names to [`Provider`] handles.
pub struct ProviderRouter {
    endpoints: BTreeMap<String, Endpoint>,
    /// Ready-made providers; these win over endpoints of the same name.
    registered: BTreeMap<String, Provider>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create an empty router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            endpoints: BTreeMap::new(),
            registered: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Add an endpoint that providers are built from on demand.
    pub fn add_endpoint(&mut self, name: impl Into<String>, endpoint: Endpoint) {
        self.endpoints.insert(name.into(), endpoint);
    }

    /// Register a ready-made provider (custom transports, tests).
    pub fn register(&mut self, name: impl Into<String>, provider: Provider) {
        self.registered.insert(name.into(), provider);
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// The provider for `name` using its configured model.
    pub fn get(&self, name: &str) -> Result<Provider, ProviderError> {
        self.get_with_model(name, None)
    }

    /// The provider for `name`, optionally overriding the model.
    pub fn get_with_model(&self, name: &str, model: Option<&str>) -> Result<Provider, ProviderError> {
        if let Some(provider) = self.registered.get(name) {
            return Ok(provider.clone());
        }
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| ProviderError::NotConfigured(name.to_string()))?;
        Ok(build_provider(name, endpoint, model))
    }

    /// The default provider.
    pub fn default(&self) -> Result<Provider, ProviderError> {
        self.get(&self.default_provider)
    }

    /// All known provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .endpoints
            .keys()
            .chain(self.registered.keys())
            .map(|s| s.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Pair the family's adapter with the matching transport.
fn build_provider(name: &str, endpoint: &Endpoint, model: Option<&str>) -> Provider {
    let model = model.unwrap_or(&endpoint.model);
    let api_key = endpoint.api_key.clone().unwrap_or_default();
    debug!(provider = name, family = %endpoint.family, model, "Building provider");

    match endpoint.family {
        ProviderFamily::BlockContent => Provider::new(
            Arc::new(BlockContentAdapter::new()),
            Arc::new(
                AnthropicTransport::new(api_key)
                    .with_name(name)
                    .with_base_url(&endpoint.base_url)
                    .with_model(model)
                    .with_max_tokens(endpoint.max_tokens),
            ),
        ),
        ProviderFamily::FunctionCall => Provider::new(
            Arc::new(FunctionCallAdapter::new()),
            Arc::new(
                OpenAiCompatTransport::new(name, &endpoint.base_url, api_key, model)
                    .with_max_tokens(endpoint.max_tokens),
            ),
        ),
    }
}

/// Build a router with an endpoint for every provider the config references.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for name in config.referenced_providers() {
        let provider_config = config.providers.get(&name);
        let family = family_for(&name, provider_config.and_then(|p| p.family));
        let base_url = provider_config
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| default_base_url(&name));

        let endpoint = Endpoint {
            family,
            base_url,
            api_key: config.api_key_for(&name),
            model: config.model_for(&name),
            max_tokens: config.default_max_tokens,
        };
        router.add_endpoint(name, endpoint);
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "anthropic" => anthropic::DEFAULT_BASE_URL.into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
