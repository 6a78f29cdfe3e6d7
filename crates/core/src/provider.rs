//! Provider abstractions — wire-format adapters, transports, and transcripts.
//!
//! A vendor is split along two seams:
//!
//! - [`ProviderAdapter`] knows a *wire-format family*: how a transcript turn
//!   looks, how to encode a request body, how to parse a raw response into a
//!   [`ToolResponse`], and how to fold tool results back into the transcript.
//!   There is one implementation per family, not per vendor.
//! - [`ProviderTransport`] knows an *endpoint*: URL, auth headers, timeouts.
//!   It returns the raw response bytes untouched.
//!
//! A [`Provider`] pairs the two. Adding a vendor that speaks an existing
//! family is configuration, not code.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::warn;

use crate::error::{Error, ProviderError};
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// A class of vendors sharing one wire shape for tool calls and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Assistant turns are typed content blocks (`text`, `tool_use`); tool
    /// results go back as one user turn of `tool_result` blocks.
    BlockContent,
    /// Assistant turns carry `tool_calls[]`; each result is its own `tool` turn.
    FunctionCall,
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFamily::BlockContent => f.write_str("block_content"),
            ProviderFamily::FunctionCall => f.write_str("function_call"),
        }
    }
}

/// The untouched vendor payload of an assistant turn.
///
/// Kept when the vendor attached fields the canonical model does not
/// capture (reasoning tokens, thought signatures, ...). The core never looks
/// inside; the owning adapter re-emits it verbatim.
#[derive(Debug, Clone)]
pub struct RawTurn(Box<RawValue>);

impl RawTurn {
    pub fn new(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    pub fn as_raw(&self) -> &RawValue {
        &self.0
    }

    pub fn into_inner(self) -> Box<RawValue> {
        self.0
    }
}

impl PartialEq for RawTurn {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// One provider turn, parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResponse {
    /// Assistant text, if the turn contained any
    pub text: Option<String>,

    /// Tool calls in the order the model emitted them
    pub tool_calls: Vec<ToolCall>,

    pub input_tokens: u64,
    pub output_tokens: u64,

    /// Verbatim assistant turn, present only when it carries vendor-private state
    pub raw_turn: Option<RawTurn>,
}

impl ToolResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// The vendor-shaped turn history accumulated for one provider family.
///
/// Entries are stored as raw JSON text so passthrough turns survive
/// byte-for-byte. Only adapters create entries; everyone else appends what
/// an adapter hands them, reads the length, or persists the whole thing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    family: ProviderFamily,
    entries: Vec<Box<RawValue>>,
}

impl Transcript {
    pub fn new(family: ProviderFamily) -> Self {
        Self {
            family,
            entries: Vec::new(),
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn entries(&self) -> &[Box<RawValue>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw JSON text of entry `index`.
    pub fn entry(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.get())
    }

    /// Append a turn built from a serialisable wire type.
    pub fn push_json<T: Serialize + ?Sized>(&mut self, turn: &T) -> Result<(), serde_json::Error> {
        self.entries.push(serde_json::value::to_raw_value(turn)?);
        Ok(())
    }

    /// Append a turn verbatim.
    pub fn push_raw(&mut self, turn: RawTurn) {
        self.entries.push(turn.into_inner());
    }

    /// Fail unless this transcript belongs to `family`.
    pub fn ensure_family(&self, family: ProviderFamily) -> Result<(), Error> {
        if self.family == family {
            Ok(())
        } else {
            warn!(expected = ?family, found = ?self.family, "Transcript belongs to another provider family");
            Err(Error::TranscriptMismatch {
                expected: family,
                found: self.family,
            })
        }
    }
}

/// Everything an adapter needs to encode one request body.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system_prompt: &'a str,
    pub transcript: &'a Transcript,
    pub tools: &'a [ToolDefinition],
}

/// Wire-format knowledge for one provider family.
pub trait ProviderAdapter: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Start a transcript from plain prior messages plus the new user message.
    fn seed(&self, history: &[Message], user_message: &str) -> Result<Transcript, Error>;

    /// Append a user message to an existing transcript (session continuation).
    fn append_user(&self, transcript: &mut Transcript, user_message: &str) -> Result<(), Error>;

    /// Encode the JSON request body for one turn.
    fn encode_request(&self, request: &TurnRequest<'_>) -> Result<Vec<u8>, Error>;

    /// Parse a raw vendor response. A missing `content`/`choices` array is a
    /// [`ProviderError::MalformedResponse`].
    fn parse(&self, raw: &[u8]) -> Result<ToolResponse, ProviderError>;

    /// Append the assistant tool-use turn and the tool-result turn(s).
    ///
    /// `results` must hold exactly one entry per call in `response`, in call order.
    fn build_continuation(
        &self,
        transcript: &mut Transcript,
        response: &ToolResponse,
        results: &[ToolResult],
    ) -> Result<(), Error>;

    /// Append the terminal assistant text turn.
    fn append_final(&self, transcript: &mut Transcript, response: &ToolResponse) -> Result<(), Error>;
}

/// One vendor endpoint. Returns the response body bytes unparsed.
///
/// Transports never retry: a contract break must surface, not be masked.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// A human-readable name for this endpoint (e.g., "anthropic", "openrouter").
    fn name(&self) -> &str;

    async fn generate_with_tools(
        &self,
        transcript: &Transcript,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<u8>, ProviderError>;
}

/// An adapter/transport pair the agent loop talks to.
#[derive(Clone)]
pub struct Provider {
    adapter: Arc<dyn ProviderAdapter>,
    transport: Arc<dyn ProviderTransport>,
}

impl Provider {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { adapter, transport }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn family(&self) -> ProviderFamily {
        self.adapter.family()
    }

    pub fn adapter(&self) -> &dyn ProviderAdapter {
        self.adapter.as_ref()
    }

    pub fn transport(&self) -> &dyn ProviderTransport {
        self.transport.as_ref()
    }

    /// One network round-trip followed by adapter parsing.
    pub async fn generate(
        &self,
        transcript: &Transcript,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ToolResponse, ProviderError> {
        let raw = self
            .transport
            .generate_with_tools(transcript, system_prompt, tools)
            .await?;
        self.adapter.parse(&raw)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("family", &self.family())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_display_matches_serde_name() {
        let json = serde_json::to_string(&ProviderFamily::FunctionCall).unwrap();
        assert_eq!(json, format!("\"{}\"", ProviderFamily::FunctionCall));
    }

    #[test]
    fn transcript_keeps_raw_text_verbatim() {
        let mut transcript = Transcript::new(ProviderFamily::FunctionCall);
        let raw = RawValue::from_string(r#"{"role":"assistant","zeta":1,"alpha":2}"#.into()).unwrap();
        transcript.push_raw(RawTurn::new(raw));
        assert_eq!(transcript.entry(0), Some(r#"{"role":"assistant","zeta":1,"alpha":2}"#));
    }

    #[test]
    fn transcript_persists_and_reloads() {
        let mut transcript = Transcript::new(ProviderFamily::BlockContent);
        transcript
            .push_json(&serde_json::json!({"role": "user", "content": "hi"}))
            .unwrap();
        let saved = serde_json::to_string(&transcript).unwrap();
        let loaded: Transcript = serde_json::from_str(&saved).unwrap();
        assert_eq!(loaded.family(), ProviderFamily::BlockContent);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entry(0), transcript.entry(0));
    }

    #[test]
    fn ensure_family_rejects_foreign_transcript() {
        let transcript = Transcript::new(ProviderFamily::BlockContent);
        assert!(transcript.ensure_family(ProviderFamily::BlockContent).is_ok());
        assert!(matches!(
            transcript.ensure_family(ProviderFamily::FunctionCall),
            Err(Error::TranscriptMismatch { .. })
        ));
    }

    #[test]
    fn tool_response_helpers() {
        let response = ToolResponse {
            text: None,
            tool_calls: vec![ToolCall::new("1", "create_file", "{}")],
            ..Default::default()
        };
        assert!(response.has_tool_calls());
        assert_eq!(response.text_or_empty(), "");
    }
}
