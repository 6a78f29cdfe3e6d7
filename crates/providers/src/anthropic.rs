//! Anthropic Messages API transport (block-content family).
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - Request bodies come from [`BlockContentAdapter`]; the response body is
//!   returned untouched for the adapter to parse

use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::ProviderError;
use forgeloop_core::provider::*;
use forgeloop_core::tool::ToolDefinition;
use tracing::debug;

use crate::block_content::BlockContentAdapter;
use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Transport for Anthropic's native Messages API.
pub struct AnthropicTransport {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
    adapter: BlockContentAdapter,
}

impl AnthropicTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            // Anthropic can be slow with long tool turns
            client: http::client(Duration::from_secs(300)),
            adapter: BlockContentAdapter::new(),
        }
    }

    /// Use a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Register under another name (a proxy speaking the Messages API).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ProviderTransport for AnthropicTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_with_tools(
        &self,
        transcript: &Transcript,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<u8>, ProviderError> {
        let body = self
            .adapter
            .encode_request(&TurnRequest {
                model: &self.model,
                max_tokens: self.max_tokens,
                system_prompt,
                transcript,
                tools,
            })
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        debug!(
            provider = %self.name,
            model = %self.model,
            turns = transcript.len(),
            tools = tools.len(),
            "Sending messages request"
        );

        let request = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .body(body);

        http::send(request, &self.name).await
    }
}
