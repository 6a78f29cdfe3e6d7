//! OpenAI-compatible chat completions transport (function-call family).
//!
//! Works with: OpenAI, OpenRouter, Ollama, DeepSeek, Groq, vLLM, Together AI,
//! and any endpoint exposing `/chat/completions`. Vendors differ only in
//! base URL and key; the wire shape is handled by [`FunctionCallAdapter`].

use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::ProviderError;
use forgeloop_core::provider::*;
use forgeloop_core::tool::ToolDefinition;
use tracing::debug;

use crate::function_call::FunctionCallAdapter;
use crate::http;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Transport for an OpenAI-compatible endpoint.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
    adapter: FunctionCallAdapter,
}

impl OpenAiCompatTransport {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client: http::client(Duration::from_secs(120)),
            adapter: FunctionCallAdapter::new(),
        }
    }

    /// Create an OpenRouter transport (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an OpenAI transport (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama transport (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "",
            model,
        )
    }

    pub fn deepseek(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("deepseek", "https://api.deepseek.com/v1", api_key, model)
    }

    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("groq", "https://api.groq.com/openai/v1", api_key, model)
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
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ProviderTransport for OpenAiCompatTransport {
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
            "Sending completion request"
        );

        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .body(body);
        // Local servers (Ollama, vLLM) run without a key
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        http::send(request, &self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let transport = OpenAiCompatTransport::openrouter("sk-or-test", "anthropic/claude-sonnet-4");
        assert_eq!(transport.name(), "openrouter");
        assert_eq!(transport.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(transport.model(), "anthropic/claude-sonnet-4");
    }

    #[test]
    fn ollama_constructor() {
        let transport = OpenAiCompatTransport::ollama(None, "llama3.1");
        assert_eq!(transport.base_url(), "http://localhost:11434/v1");

        let custom = OpenAiCompatTransport::ollama(Some("http://gpu-box:11434/v1/"), "qwen2.5");
        assert_eq!(custom.base_url(), "http://gpu-box:11434/v1");
    }

    #[test]
    fn vendor_constructors_share_the_family() {
        for transport in [
            OpenAiCompatTransport::openai("k", "gpt-4o"),
            OpenAiCompatTransport::deepseek("k", "deepseek-chat"),
            OpenAiCompatTransport::groq("k", "llama-3.3-70b-versatile"),
        ] {
            assert!(transport.endpoint().ends_with("/chat/completions"));
        }
    }
}
