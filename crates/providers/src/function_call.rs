//! Function-call wire family (OpenAI chat completions and every compatible
//! endpoint: OpenRouter, Ollama, DeepSeek, Groq, vLLM, ...).
//!
//! - Assistant turns carry `tool_calls[]` with string-encoded arguments
//! - Each tool result is its own `{role: "tool", tool_call_id, content}` message
//! - The system prompt is the first message, added at encode time only
//!
//! Vendors behind this family attach private fields to assistant messages
//! (reasoning traces, signatures), sometimes nested inside a tool call
//! (`tool_calls[i].extra_content`). When a parsed message has any non-null
//! field the canonical model does not capture, at any of those levels, the
//! message is kept as a [`RawTurn`] and re-emitted byte-for-byte in the next
//! request.

use forgeloop_core::error::{Error, ProviderError};
use forgeloop_core::message::Message;
use forgeloop_core::provider::*;
use forgeloop_core::tool::{ToolCall, ToolDefinition, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::trace;

use crate::{ensure_answered, unknown_keys};

/// Fields the canonical model fully captures, per nesting level.
const MESSAGE_FIELDS: &[&str] = &["role", "content", "tool_calls"];
const TOOL_CALL_FIELDS: &[&str] = &["id", "type", "function"];
const FUNCTION_FIELDS: &[&str] = &["name", "arguments"];

/// Adapter for the function-call family.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionCallAdapter;

impl FunctionCallAdapter {
    pub fn new() -> Self {
        Self
    }

    fn push_text_turn(transcript: &mut Transcript, role: &str, text: &str) -> Result<(), Error> {
        transcript.push_json(&ChatMessage {
            role,
            content: Some(text),
        })?;
        Ok(())
    }

    fn push_assistant(transcript: &mut Transcript, response: &ToolResponse) -> Result<(), Error> {
        if let Some(raw) = &response.raw_turn {
            transcript.push_raw(raw.clone());
            return Ok(());
        }
        let tool_calls: Vec<WireToolCall<'_>> = response
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: &call.id,
                kind: "function",
                function: WireFunction {
                    name: &call.name,
                    arguments: &call.arguments,
                },
            })
            .collect();
        transcript.push_json(&AssistantMessage {
            role: "assistant",
            content: response.text.as_deref(),
            tool_calls,
        })?;
        Ok(())
    }
}

impl ProviderAdapter for FunctionCallAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::FunctionCall
    }

    fn seed(&self, history: &[Message], user_message: &str) -> Result<Transcript, Error> {
        let mut transcript = Transcript::new(ProviderFamily::FunctionCall);
        for msg in history {
            Self::push_text_turn(&mut transcript, msg.role.as_str(), &msg.content)?;
        }
        Self::push_text_turn(&mut transcript, "user", user_message)?;
        Ok(transcript)
    }

    fn append_user(&self, transcript: &mut Transcript, user_message: &str) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::FunctionCall)?;
        Self::push_text_turn(transcript, "user", user_message)
    }

    fn encode_request(&self, request: &TurnRequest<'_>) -> Result<Vec<u8>, Error> {
        let system = if request.system_prompt.is_empty() {
            None
        } else {
            Some(serde_json::value::to_raw_value(&ChatMessage {
                role: "system",
                content: Some(request.system_prompt),
            })?)
        };

        let mut messages: Vec<&RawValue> = Vec::with_capacity(request.transcript.len() + 1);
        messages.extend(system.as_deref());
        messages.extend(request.transcript.entries().iter().map(|e| e.as_ref()));

        let body = ChatRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            messages,
            tools: request.tools.iter().map(ChatTool::from).collect(),
        };
        Ok(serde_json::to_vec(&body)?)
    }

    fn parse(&self, raw: &[u8]) -> Result<ToolResponse, ProviderError> {
        let resp: ChatResponse<'_> = serde_json::from_slice(raw)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))?;

        let choices = resp.choices.ok_or_else(|| {
            ProviderError::MalformedResponse("response has no choices array".into())
        })?;
        let message = choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response has no assistant message".into())
            })?;

        let private = private_fields(message)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid message: {e}")))?;
        if !private.is_empty() {
            trace!(fields = ?private, "Keeping assistant turn verbatim");
        }

        let parsed: ResponseMessage<'_> = serde_json::from_str(message.get())
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid message: {e}")))?;

        let tool_calls = parsed
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, arguments_text(tc.function.arguments)))
            .collect();

        let usage = resp.usage.unwrap_or_default();
        Ok(ToolResponse {
            text: parsed.content.filter(|c| !c.is_empty()),
            tool_calls,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            raw_turn: (!private.is_empty()).then(|| RawTurn::new(message.to_owned())),
        })
    }

    fn build_continuation(
        &self,
        transcript: &mut Transcript,
        response: &ToolResponse,
        results: &[ToolResult],
    ) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::FunctionCall)?;
        ensure_answered(&response.tool_calls, results)?;

        Self::push_assistant(transcript, response)?;
        for result in results {
            transcript.push_json(&ToolMessage {
                role: "tool",
                tool_call_id: &result.call.id,
                content: &result.output,
            })?;
        }
        Ok(())
    }

    fn append_final(&self, transcript: &mut Transcript, response: &ToolResponse) -> Result<(), Error> {
        transcript.ensure_family(ProviderFamily::FunctionCall)?;
        match &response.raw_turn {
            Some(raw) => {
                transcript.push_raw(raw.clone());
                Ok(())
            }
            None => Self::push_text_turn(transcript, "assistant", response.text_or_empty()),
        }
    }
}

/// Dotted paths of every vendor-private field in an assistant message.
fn private_fields(message: &RawValue) -> Result<Vec<String>, serde_json::Error> {
    let mut private = unknown_keys(message, MESSAGE_FIELDS)?;
    let shape: MessageShape<'_> = serde_json::from_str(message.get())?;
    for (i, call) in shape.tool_calls.unwrap_or_default().into_iter().enumerate() {
        private.extend(
            unknown_keys(call, TOOL_CALL_FIELDS)?
                .into_iter()
                .map(|key| format!("tool_calls[{i}].{key}")),
        );
        let call: CallShape<'_> = serde_json::from_str(call.get())?;
        if let Some(function) = call.function {
            private.extend(
                unknown_keys(function, FUNCTION_FIELDS)?
                    .into_iter()
                    .map(|key| format!("tool_calls[{i}].function.{key}")),
            );
        }
    }
    Ok(private)
}

/// Arguments arrive as a JSON string on most endpoints, but some (Ollama)
/// send the object itself.
fn arguments_text(arguments: Option<&RawValue>) -> String {
    match arguments {
        None => "{}".into(),
        Some(raw) if raw.get() == "null" => "{}".into(),
        Some(raw) => {
            serde_json::from_str::<String>(raw.get()).unwrap_or_else(|_| raw.get().to_string())
        }
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<&'a RawValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool<'a>>,
}

#[derive(Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    function: ChatToolFunction<'a>,
}

#[derive(Serialize)]
struct ChatToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

impl<'a> From<&'a ToolDefinition> for ChatTool<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: ChatToolFunction {
                name: &def.name,
                description: &def.description,
                parameters: &def.input_schema,
            },
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Option<&'a str>,
}

#[derive(Serialize)]
struct AssistantMessage<'a> {
    role: &'a str,
    content: Option<&'a str>,
    tool_calls: Vec<WireToolCall<'a>>,
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct ToolMessage<'a> {
    role: &'a str,
    tool_call_id: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse<'a> {
    #[serde(borrow, default)]
    choices: Option<Vec<ChatChoice<'a>>>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice<'a> {
    #[serde(borrow, default)]
    message: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct ResponseMessage<'a> {
    #[serde(default)]
    content: Option<String>,
    #[serde(borrow, default)]
    tool_calls: Option<Vec<ResponseToolCall<'a>>>,
}

#[derive(Deserialize)]
struct MessageShape<'a> {
    #[serde(borrow, default)]
    tool_calls: Option<Vec<&'a RawValue>>,
}

#[derive(Deserialize)]
struct CallShape<'a> {
    #[serde(borrow, default)]
    function: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct ResponseToolCall<'a> {
    id: String,
    #[serde(borrow)]
    function: ResponseFunction<'a>,
}

#[derive(Deserialize)]
struct ResponseFunction<'a> {
    name: String,
    #[serde(borrow, default)]
    arguments: Option<&'a RawValue>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
