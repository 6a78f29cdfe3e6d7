//! End-to-end integration tests for the forgeloop agent.
//!
//! These tests drive the full pipeline from user input to agent output:
//! scripted vendor payloads go through the real adapters, tool calls run the
//! real workspace tools, and continuations are checked on the request bodies
//! the next turn would have sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forgeloop_agent::{AgentLoop, DelegateTool, ToolDispatcher};
use forgeloop_config::AppConfig;
use forgeloop_core::agent::{AgentOutcome, PriorHistory};
use forgeloop_core::error::ProviderError;
use forgeloop_core::event::{AgentEvent, EventBus};
use forgeloop_core::provider::{Provider, ProviderFamily, ProviderTransport, Transcript, TurnRequest};
use forgeloop_core::tool::{ToolDefinition, ToolRegistry};
use forgeloop_providers::adapter_for;
use forgeloop_tools::{Workspace, default_registry};
use serde_json::json;

// ── Scripted transport ───────────────────────────────────────────────────

/// Returns queued raw vendor bodies and keeps the request bodies it was sent.
struct ScriptedTransport {
    family: ProviderFamily,
    responses: Mutex<VecDeque<String>>,
    bodies: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTransport {
    fn new(family: ProviderFamily, responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            family,
            responses: Mutex::new(responses.into()),
            bodies: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    fn body(&self, index: usize) -> serde_json::Value {
        self.bodies.lock().unwrap()[index].clone()
    }

    fn provider(self: &Arc<Self>) -> Provider {
        Provider::new(adapter_for(self.family), self.clone())
    }
}

#[async_trait::async_trait]
impl ProviderTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn generate_with_tools(
        &self,
        transcript: &Transcript,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<u8>, ProviderError> {
        let body = adapter_for(self.family)
            .encode_request(&TurnRequest {
                model: "e2e-model",
                max_tokens: 512,
                system_prompt,
                transcript,
                tools,
            })
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;
        self.bodies
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&body).unwrap());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(raw) => Ok(raw.into_bytes()),
            None => panic!("ScriptedTransport exhausted after {} calls", self.calls()),
        }
    }
}

fn chat_tool_calls(calls: &[(&str, &str, serde_json::Value)]) -> String {
    let tool_calls: Vec<_> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({"id": id, "type": "function", "function": {"name": name, "arguments": args.to_string()}})
        })
        .collect();
    json!({
        "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": tool_calls}}],
        "usage": {"prompt_tokens": 100, "completion_tokens": 20}
    })
    .to_string()
}

fn chat_text(text: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 150, "completion_tokens": 8}
    })
    .to_string()
}

fn blocks_text(text: &str) -> String {
    json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 90, "output_tokens": 6}
    })
    .to_string()
}

fn tools_in(dir: &std::path::Path) -> ToolRegistry {
    default_registry(Workspace::new(dir), Duration::from_secs(10))
}

// ── E2E: single tool turn ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_function_call_family_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(
        ProviderFamily::FunctionCall,
        vec![
            chat_tool_calls(&[(
                "call_1",
                "create_file",
                json!({"path": "hello.txt", "content": "hi"}),
            )]),
            chat_text("Wrote hello.txt."),
        ],
    );
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path()));

    let result = agent
        .run("write hello.txt containing hi", PriorHistory::None, "You are terse.")
        .await
        .unwrap();

    assert_eq!(result.text, "Wrote hello.txt.");
    assert_eq!(result.outcome, AgentOutcome::Completed);
    assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi");
    assert_eq!(result.total_input_tokens, 250);
    assert_eq!(result.total_output_tokens, 28);
    assert_eq!(result.transcript.len(), 4);

    let second = transport.body(1);
    assert_eq!(second["messages"][0]["role"], "system");
    assert_eq!(second["messages"][2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(second["messages"][3]["content"], "Created hello.txt (2 chars)");
}

#[tokio::test]
async fn e2e_block_content_thinking_is_replayed_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let thinking_turn = r#"{"content":[{"type":"thinking","thinking":"List first.","signature":"EqQBCgIYAhIM"},{"type":"tool_use","id":"toolu_01","name":"list_files","input":{}}],"usage":{"input_tokens":40,"output_tokens":12}}"#;
    let transport = ScriptedTransport::new(
        ProviderFamily::BlockContent,
        vec![thinking_turn.to_string(), blocks_text("The workspace is empty.")],
    );
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path()));

    let result = agent
        .run("what is in the workspace?", PriorHistory::None, "")
        .await
        .unwrap();

    assert_eq!(result.text, "The workspace is empty.");
    assert_eq!(
        result.transcript.entry(1).unwrap(),
        r#"{"role":"assistant","content":[{"type":"thinking","thinking":"List first.","signature":"EqQBCgIYAhIM"},{"type":"tool_use","id":"toolu_01","name":"list_files","input":{}}]}"#
    );

    let second = transport.body(1);
    assert_eq!(second["messages"][1]["content"][0]["signature"], "EqQBCgIYAhIM");
    let result_block = &second["messages"][2]["content"][0];
    assert_eq!(result_block["type"], "tool_result");
    assert_eq!(result_block["tool_use_id"], "toolu_01");
    assert_eq!(result_block["content"], "(empty directory)");
}

// ── E2E: priority and concurrency ────────────────────────────────────────

#[tokio::test]
async fn e2e_priority_project_is_created_before_files() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(
        ProviderFamily::FunctionCall,
        vec![
            chat_tool_calls(&[
                ("c1", "create_file", json!({"path": "demo/src/main.rs", "content": "fn main() {}"})),
                ("c2", "create_project", json!({"name": "demo"})),
                ("c3", "create_file", json!({"path": "demo/README.md", "content": "# demo"})),
            ]),
            chat_text("Project scaffolded."),
        ],
    );
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path()))
        .with_dispatcher(ToolDispatcher::new(["create_project"]))
        .with_events(events);

    agent.run("scaffold demo", PriorHistory::None, "").await.unwrap();

    let mut done = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::ToolDone { name, summary } = event.as_ref() {
            done.push((name.clone(), summary.clone()));
        }
    }
    assert_eq!(done.len(), 3);
    assert_eq!(done[0], ("create_project".to_string(), "Created project demo".to_string()));
    assert!(dir.path().join("demo/src/main.rs").exists());

    // results are still reported in call order
    let messages = transport.body(1)["messages"].clone();
    let ids: Vec<_> = (2..5).map(|i| messages[i]["tool_call_id"].clone()).collect();
    assert_eq!(ids, vec![json!("c1"), json!("c2"), json!("c3")]);
}

#[tokio::test]
async fn e2e_failing_call_is_reported_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(
        ProviderFamily::FunctionCall,
        vec![
            chat_tool_calls(&[
                ("c1", "read_file", json!({"path": "missing.txt"})),
                ("c2", "create_file", json!({"path": "ok.txt", "content": "fine"})),
                ("c3", "create_file", json!({"path": "../escape.txt", "content": "x"})),
            ]),
            chat_text("One file could not be read."),
        ],
    );
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path()));

    let result = agent.run("go", PriorHistory::None, "").await.unwrap();

    assert!(result.is_complete());
    let messages = transport.body(1)["messages"].clone();
    assert!(messages[2]["content"].as_str().unwrap().starts_with("Error: "));
    assert_eq!(messages[3]["content"], "Created ok.txt (4 chars)");
    assert!(
        messages[4]["content"]
            .as_str()
            .unwrap()
            .starts_with("Error: Permission denied")
    );
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

// ── E2E: step budget ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_step_budget_returns_explanation() {
    let dir = tempfile::tempdir().unwrap();
    let looping = chat_tool_calls(&[("c", "list_files", json!({}))]);
    let transport = ScriptedTransport::new(
        ProviderFamily::FunctionCall,
        vec![looping.clone(), looping.clone(), looping],
    );
    let config: AppConfig = toml::from_str(
        r#"
        [agent]
        max_iterations = 3
        step_budget_message = "Stopped after 3 steps."
        "#,
    )
    .unwrap();
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path())).with_settings(&config.agent);

    let result = agent.run("loop", PriorHistory::None, "").await.unwrap();

    assert_eq!(result.outcome, AgentOutcome::StepBudgetExceeded);
    assert_eq!(result.text, "Stopped after 3 steps.");
    assert_eq!(transport.calls(), 3);
    assert_eq!(result.total_output_tokens, 60);
}

// ── E2E: delegation ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_parent_delegates_review_to_read_only_role() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn add(a: i32, b: i32) -> i32 { a - b }").unwrap();

    let transport = ScriptedTransport::new(
        ProviderFamily::FunctionCall,
        vec![
            // parent asks the reviewer
            chat_tool_calls(&[(
                "p1",
                "delegate_task",
                json!({"role": "reviewer", "task": "Review lib.rs"}),
            )]),
            // reviewer reads the file
            chat_tool_calls(&[("r1", "read_file", json!({"path": "lib.rs"}))]),
            // reviewer reports
            chat_text("add() subtracts instead of adding."),
            // parent answers
            chat_text("The reviewer found a bug in add()."),
        ],
    );
    let config = AppConfig::default();
    let provider = transport.provider();
    let events = EventBus::new(64);
    let base = tools_in(dir.path());
    let delegate = DelegateTool::from_config(&config, base.clone(), Arc::new(provider.clone()))
        .with_events(events.clone());
    let agent = AgentLoop::new(provider, base.with(Arc::new(delegate))).with_events(events);

    let result = agent.run("review my code", PriorHistory::None, "").await.unwrap();

    assert_eq!(result.text, "The reviewer found a bug in add().");
    assert_eq!(transport.calls(), 4);

    // the child ran with the reviewer prompt and read-only tools
    let child_first = transport.body(1);
    let child_tools: Vec<_> = child_first["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(child_tools, vec!["list_files", "read_file"]);
    assert!(
        child_first["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("code reviewer")
    );

    // the child saw the file contents
    let child_second = transport.body(2);
    assert!(
        child_second["messages"][3]["content"]
            .as_str()
            .unwrap()
            .contains("a - b")
    );

    // the parent got the child's answer as the tool result
    let parent_last = transport.body(3);
    assert_eq!(parent_last["messages"][2]["tool_call_id"], "p1");
    assert_eq!(parent_last["messages"][2]["content"], "add() subtracts instead of adding.");
}

// ── E2E: multi-turn session ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_saved_transcript_resumes_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(
        ProviderFamily::BlockContent,
        vec![blocks_text("Nice to meet you, Ada."), blocks_text("Your name is Ada.")],
    );
    let agent = AgentLoop::new(transport.provider(), tools_in(dir.path()));

    let first = agent.run("I'm Ada", PriorHistory::None, "").await.unwrap();

    let saved = serde_json::to_string(&first.transcript).unwrap();
    let restored: Transcript = serde_json::from_str(&saved).unwrap();
    let second = agent.resume(restored, "What's my name?", "").await.unwrap();

    assert_eq!(second.text, "Your name is Ada.");
    let body = transport.body(1);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"], "Nice to meet you, Ada.");
    assert_eq!(messages[2]["content"], "What's my name?");
}
