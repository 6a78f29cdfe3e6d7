//! Block-content wire family (Anthropic Messages API and compatible endpoints).
//!
//! - Assistant turns are arrays of typed content blocks (`text`, `tool_use`, ...)
//! - Tool results go back as one `user` turn of `tool_result` blocks, in call order
//! - The system prompt is a top-level request field, never a message
//!
//! An assistant turn holding a block type or block field this adapter does
//! not model (thinking blocks, signatures, `caller` on `tool_use`) is kept as
//! a [`RawTurn`] and echoed back unchanged.

use forgeloop_core::error::{Error, ProviderError};
use forgeloop_core::message::Message;
use forgeloop_core::provider::*;
use forgeloop_core::tool::{ToolCall, ToolDefinition, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::trace;

use crate::{ensure_answered, unknown_keys};

const TEXT_FIELDS: &[&str] = &["type", "text"];
const TOOL_USE_FIELDS: &[&str] = &["type", "id", "name", "input"];

/// Adapter for the block-content family.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContentAdapter;

impl BlockContentAdapter {
    pub fn new() -> Self {
        Self
    }

    fn push_text_turn(transcript: &mut Transcript, role: &str, text: &str) -> Result<(), Error> {
        transcript.push_json(&TextTurn {
            role,
            content: text,
        })?;
        Ok(())
    }
}

impl ProviderAdapter for BlockContentAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::BlockContent
    }

    fn seed(&self, history: &[Message], user_message: &str) -> Result<Transcript, Error> {
        let mut transcript = Transcript::new(ProviderFamily::BlockContent);
        for msg in history {
            Self::push_text_turn(&mut transcript, msg.role.as_str(), &msg.content)?;
        }
        Self::push_text_turn(&mut transcript, "user", user_message)?;
        Ok(transcript)
    }

    fn append_user(&self, transcript: &mut Transcript, user_message: &str) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::BlockContent)?;
        Self::push_text_turn(transcript, "user", user_message)
    }

    fn encode_request(&self, request: &TurnRequest<'_>) -> Result<Vec<u8>, Error> {
        let body = MessagesRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            system: request.system_prompt,
            messages: request
                .transcript
                .entries()
                .iter()
                .map(|e| e.as_ref())
                .filter(|e| !is_empty_turn(e))
                .collect(),
            tools: request.tools.iter().map(BlockTool::from).collect(),
        };
        Ok(serde_json::to_vec(&body)?)
    }

    fn parse(&self, raw: &[u8]) -> Result<ToolResponse, ProviderError> {
        let resp: MessagesResponse<'_> = serde_json::from_slice(raw)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))?;

        let content = resp.content.ok_or_else(|| {
            ProviderError::MalformedResponse("response has no content array".into())
        })?;
        let blocks: Vec<&RawValue> = serde_json::from_str(content.get()).map_err(|_| {
            ProviderError::MalformedResponse("response content is not an array".into())
        })?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls = Vec::new();
        let mut has_private_blocks = false;

        for block in blocks {
            let parsed: ResponseBlock<'_> = serde_json::from_str(block.get()).map_err(|e| {
                ProviderError::MalformedResponse(format!("invalid content block: {e}"))
            })?;
            let known = match parsed.kind.as_str() {
                "text" => Some(TEXT_FIELDS),
                "tool_use" => Some(TOOL_USE_FIELDS),
                _ => None,
            };
            if let Some(known) = known {
                let extra = unknown_keys(block, known).map_err(|e| {
                    ProviderError::MalformedResponse(format!("invalid content block: {e}"))
                })?;
                if !extra.is_empty() {
                    trace!(block_type = %parsed.kind, fields = ?extra, "Keeping content block verbatim");
                    has_private_blocks = true;
                }
            }
            match parsed.kind.as_str() {
                "text" => {
                    if let Some(text) = parsed.text {
                        text_parts.push(text);
                    }
                }
                "tool_use" => {
                    let (Some(id), Some(name)) = (parsed.id, parsed.name) else {
                        return Err(ProviderError::MalformedResponse(
                            "tool_use block without id or name".into(),
                        ));
                    };
                    let arguments = parsed.input.map(|i| i.get().to_string()).unwrap_or_else(|| "{}".into());
                    tool_calls.push(ToolCall::new(id, name, arguments));
                }
                other => {
                    trace!(block_type = other, "Keeping vendor-private content block");
                    has_private_blocks = true;
                }
            }
        }

        let usage = resp.usage.unwrap_or_default();
        Ok(ToolResponse {
            text: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
            tool_calls,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            raw_turn: has_private_blocks.then(|| RawTurn::new(content.to_owned())),
        })
    }

    fn build_continuation(
        &self,
        transcript: &mut Transcript,
        response: &ToolResponse,
        results: &[ToolResult],
    ) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::BlockContent)?;
        ensure_answered(&response.tool_calls, results)?;

        match &response.raw_turn {
            Some(raw) => transcript.push_json(&RawBlocksTurn {
                role: "assistant",
                content: raw.as_raw(),
            })?,
            None => {
                let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
                if let Some(text) = response.text.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(Block::Text { text });
                }
                for call in &response.tool_calls {
                    blocks.push(Block::ToolUse {
                        id: &call.id,
                        name: &call.name,
                        input: tool_input(call)?,
                    });
                }
                transcript.push_json(&BlocksTurn {
                    role: "assistant",
                    content: blocks,
                })?;
            }
        }

        let result_blocks: Vec<Block<'_>> = results
            .iter()
            .map(|r| Block::ToolResult {
                tool_use_id: &r.call.id,
                content: &r.output,
            })
            .collect();
        transcript.push_json(&BlocksTurn {
            role: "user",
            content: result_blocks,
        })?;
        Ok(())
    }

    fn append_final(&self, transcript: &mut Transcript, response: &ToolResponse) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::BlockContent)?;
        match &response.raw_turn {
            Some(raw) => {
                transcript.push_json(&RawBlocksTurn {
                    role: "assistant",
                    content: raw.as_raw(),
                })?;
                Ok(())
            }
            None => Self::push_text_turn(transcript, "assistant", response.text_or_empty()),
        }
    }
}

/// Turns whose content is `""` or `[]`. The Messages API rejects them, so
/// they stay in the transcript but are left out of requests.
fn is_empty_turn(entry: &RawValue) -> bool {
    serde_json::from_str::<TurnShape<'_>>(entry.get())
        .map(|turn| matches!(turn.content.map(|c| c.get()), Some("\"\"" | "[]")))
        .unwrap_or(false)
}

/// The `input` object of a `tool_use` block, taken verbatim from the argument
/// string. Anything that is not a JSON object becomes `{}`.
fn tool_input(call: &ToolCall) -> Result<Box<RawValue>, serde_json::Error> {
    match RawValue::from_string(call.arguments.trim().to_string()) {
        Ok(raw) if raw.get().starts_with('{') => Ok(raw),
        _ => RawValue::from_string("{}".to_string()),
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<&'a RawValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<BlockTool<'a>>,
}

#[derive(Serialize)]
struct BlockTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

impl<'a> From<&'a ToolDefinition> for BlockTool<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            name: &def.name,
            description: &def.description,
            input_schema: &def.input_schema,
        }
    }
}

#[derive(Serialize)]
struct TextTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct BlocksTurn<'a> {
    role: &'a str,
    content: Vec<Block<'a>>,
}

#[derive(Serialize)]
struct RawBlocksTurn<'a> {
    role: &'a str,
    content: &'a RawValue,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: Box<RawValue>,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
    },
}

#[derive(Deserialize)]
struct TurnShape<'a> {
    #[serde(borrow, default)]
    content: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct MessagesResponse<'a> {
    #[serde(borrow, default)]
    content: Option<&'a RawValue>,
    #[serde(default)]
    usage: Option<BlockUsage>,
}

#[derive(Deserialize)]
struct ResponseBlock<'a> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(borrow, default)]
    input: Option<&'a RawValue>,
}

#[derive(Deserialize, Default)]
struct BlockUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
