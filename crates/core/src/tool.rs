//! Tool calls, tool results, and the traits that execute them.
//!
//! Tools are what give the agent the ability to act in the world:
//! write files, run commands, delegate to another agent, etc.
//!
//! The agent loop only depends on [`ToolExecutor`]. [`ToolRegistry`] is the
//! stock executor: a name → [`Tool`] map that also produces the catalog sent
//! to the model.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A request from the model to invoke a named tool.
///
/// `id` is opaque and vendor-assigned; it is unique within one turn.
/// `arguments` is the JSON-encoded argument object exactly as the model sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the argument string into a tool's typed argument struct.
    ///
    /// An empty argument string is treated as `{}` since some vendors omit
    /// arguments entirely for zero-parameter tools.
    pub fn decode_arguments<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        let raw = if self.arguments.trim().is_empty() {
            "{}"
        } else {
            self.arguments.as_str()
        };
        serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
            tool_name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// The arguments as a JSON value, falling back to the raw string when the
    /// model produced something that is not valid JSON.
    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(self.arguments.clone()))
    }
}

/// The outcome of one tool call.
///
/// `output` is always text: failures are rendered as `"Error: …"` so the model
/// sees them in the same channel as successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: String,
}

impl ToolResult {
    pub fn success(call: ToolCall, output: impl Into<String>) -> Self {
        Self {
            call,
            output: output.into(),
        }
    }

    pub fn failure(call: ToolCall, error: &ToolError) -> Self {
        Self {
            call,
            output: format!("Error: {error}"),
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub input_schema: serde_json::Value,
}

/// The capability the agent loop consumes to run tool calls.
///
/// Implementations must be callable concurrently: the dispatcher runs
/// non-priority calls of one turn at the same time.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;
}

/// A single named capability.
///
/// Each tool (create_file, run_command, delegate_task, ...) implements this
/// trait and is registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. Arguments are decoded from `call` by the tool itself.
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Tools are kept in name order so the catalog is stable across calls.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// A registry restricted to the named tools. Unknown names are skipped.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> ToolRegistry {
        let tools = names
            .iter()
            .filter_map(|n| {
                self.tools
                    .get_key_value(n.as_ref())
                    .map(|(k, v)| (k.clone(), Arc::clone(v)))
            })
            .collect();
        ToolRegistry { tools }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call).await
    }
}
