//! Shared test helpers for loop, dispatcher and delegation tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::{ProviderError, ToolError};
use forgeloop_core::provider::{Provider, ProviderFamily, ProviderTransport, Transcript, TurnRequest};
use forgeloop_core::tool::{ToolCall, ToolDefinition, ToolExecutor};
use forgeloop_providers::adapter_for;
use serde_json::json;
use tokio::sync::Barrier;

/// A request the scripted transport received, encoded the way the real
/// endpoint would have seen it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub body: serde_json::Value,
    pub transcript_len: usize,
    pub tool_names: Vec<String>,
}

/// A transport that returns a queue of scripted raw response bodies.
///
/// Each call pops the next body. Once the queue is empty every further call
/// fails with a network error.
pub struct ScriptedTransport {
    family: ProviderFamily,
    responses: Mutex<VecDeque<Vec<u8>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(family: ProviderFamily, responses: Vec<Vec<u8>>) -> Self {
        Self {
            family,
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_with_tools(
        &self,
        transcript: &Transcript,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<u8>, ProviderError> {
        let body = adapter_for(self.family)
            .encode_request(&TurnRequest {
                model: "scripted-model",
                max_tokens: 1024,
                system_prompt,
                transcript,
                tools,
            })
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;
        self.requests.lock().unwrap().push(RecordedRequest {
            body: serde_json::from_slice(&body).unwrap(),
            transcript_len: transcript.len(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))
    }
}

/// A provider for `family` backed by a scripted transport.
pub fn scripted_provider(
    family: ProviderFamily,
    responses: Vec<Vec<u8>>,
) -> (Provider, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(family, responses));
    let provider = Provider::new(adapter_for(family), transport.clone());
    (provider, transport)
}

// --- function-call family bodies ---

pub fn fc_text(text: &str) -> Vec<u8> {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
    })
    .to_string()
    .into_bytes()
}

/// A tool-call turn. Each entry is `(id, name, arguments)`.
pub fn fc_tool_calls(calls: &[(&str, &str, serde_json::Value)]) -> Vec<u8> {
    let tool_calls: Vec<_> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": { "name": name, "arguments": args.to_string() }
            })
        })
        .collect();
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": null, "tool_calls": tool_calls }
        }],
        "usage": { "prompt_tokens": 20, "completion_tokens": 7 }
    })
    .to_string()
    .into_bytes()
}

// --- block-content family bodies ---

pub fn block_text(text: &str) -> Vec<u8> {
    json!({
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": 10, "output_tokens": 5 }
    })
    .to_string()
    .into_bytes()
}

pub fn block_tool_use(calls: &[(&str, &str, serde_json::Value)]) -> Vec<u8> {
    let content: Vec<_> = calls
        .iter()
        .map(|(id, name, input)| json!({ "type": "tool_use", "id": id, "name": name, "input": input }))
        .collect();
    json!({
        "content": content,
        "usage": { "input_tokens": 20, "output_tokens": 7 }
    })
    .to_string()
    .into_bytes()
}

/// An executor that logs `start <name>` / `end <name>` and answers
/// `"<name> ok"`, with optional per-tool delays and failures.
#[derive(Default)]
pub struct RecordingExecutor {
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    log: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.into(), delay);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        self.log.lock().unwrap().push(format!("start {}", call.name));
        if let Some(delay) = self.delays.get(&call.name) {
            tokio::time::sleep(*delay).await;
        }
        self.log.lock().unwrap().push(format!("end {}", call.name));
        if self.failing.contains(&call.name) {
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: "scripted failure".into(),
            });
        }
        Ok(format!("{} ok", call.name))
    }
}

/// An executor whose calls only complete once `n` of them are in flight.
pub struct BarrierExecutor {
    barrier: Barrier,
}

impl BarrierExecutor {
    pub fn new(n: usize) -> Self {
        Self {
            barrier: Barrier::new(n),
        }
    }
}

#[async_trait]
impl ToolExecutor for BarrierExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        self.barrier.wait().await;
        Ok(format!("{} ok", call.name))
    }
}
