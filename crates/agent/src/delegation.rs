//! Delegation to role-scoped sub-agents.
//!
//! [`DelegateTool`] is an ordinary tool (`delegate_task`) whose execution
//! runs a fresh [`AgentLoop`] for a named role: the role's system prompt,
//! the subset of tools the role allows, and optionally its own provider and
//! model. The child's final text becomes the tool output.
//!
//! ```text
//!  parent loop ── delegate_task{role, task} ──▶ child loop (role tools)
//!       ▲                                            │
//!       └────────────── final text ◀─────────────────┘
//! ```
//!
//! The child shares the parent's event bus and observes the parent's
//! cancellation through a child token. Its transcript and token counts stay
//! private to the delegation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use forgeloop_config::{AgentSettings, AppConfig, RoleConfig};
use forgeloop_core::agent::PriorHistory;
use forgeloop_core::error::{Error, ProviderError, ToolError};
use forgeloop_core::event::EventBus;
use forgeloop_core::provider::Provider;
use forgeloop_core::tool::{Tool, ToolCall, ToolRegistry};
use forgeloop_providers::ProviderRouter;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::loop_runner::AgentLoop;

pub const DELEGATE_TOOL_NAME: &str = "delegate_task";

/// Picks the provider a role runs against.
pub trait ProviderResolver: Send + Sync {
    /// `provider` / `model` are the role's overrides; `None` means inherit.
    fn resolve(&self, provider: Option<&str>, model: Option<&str>) -> Result<Provider, ProviderError>;
}

impl ProviderResolver for ProviderRouter {
    fn resolve(&self, provider: Option<&str>, model: Option<&str>) -> Result<Provider, ProviderError> {
        self.get_with_model(provider.unwrap_or(self.default_provider()), model)
    }
}

/// Every role runs against the same provider.
impl ProviderResolver for Provider {
    fn resolve(&self, _provider: Option<&str>, _model: Option<&str>) -> Result<Provider, ProviderError> {
        Ok(self.clone())
    }
}

#[derive(Deserialize)]
struct DelegateArgs {
    role: String,
    task: String,
}

/// The `delegate_task` tool.
#[derive(Clone)]
pub struct DelegateTool {
    roles: Arc<BTreeMap<String, RoleConfig>>,
    tools: ToolRegistry,
    providers: Arc<dyn ProviderResolver>,
    settings: AgentSettings,
    events: EventBus,
    cancel: CancellationToken,
    /// Nesting level of the agent that owns this tool; the top-level agent is 0.
    depth: u32,
    description: String,
}

impl DelegateTool {
    /// `tools` is the full registry roles pick their subsets from.
    pub fn new(
        roles: BTreeMap<String, RoleConfig>,
        tools: ToolRegistry,
        providers: Arc<dyn ProviderResolver>,
    ) -> Self {
        let description = describe(&roles);
        Self {
            roles: Arc::new(roles),
            tools,
            providers,
            settings: AgentSettings::default(),
            events: EventBus::default(),
            cancel: CancellationToken::new(),
            depth: 0,
            description,
        }
    }

    /// Roles and `[agent]` settings from the configuration.
    pub fn from_config(
        config: &AppConfig,
        tools: ToolRegistry,
        providers: Arc<dyn ProviderResolver>,
    ) -> Self {
        Self::new(config.roles.clone(), tools, providers).with_settings(config.agent.clone())
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The parent's token; children are cancelled with it.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }

    /// The registry a child running `role` gets.
    fn child_tools(&self, role: &RoleConfig, child_cancel: &CancellationToken) -> ToolRegistry {
        let mut registry = self.tools.subset(&role.tools);
        let child_depth = self.depth + 1;
        if role.can_delegate && child_depth < self.settings.max_delegation_depth {
            let mut nested = self.clone();
            nested.depth = child_depth;
            nested.cancel = child_cancel.clone();
            registry.register(Arc::new(nested));
        }
        registry
    }
}

fn describe(roles: &BTreeMap<String, RoleConfig>) -> String {
    let mut text = String::from(
        "Delegate a self-contained task to a specialist sub-agent and get its final report back. Roles:",
    );
    for (name, role) in roles {
        text.push_str(&format!("\n- {name}: {}", role.description));
    }
    text
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        DELEGATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "role": {
                    "type": "string",
                    "enum": self.role_names(),
                    "description": "Which specialist should do the work"
                },
                "task": {
                    "type": "string",
                    "description": "Complete instructions; the sub-agent sees nothing else"
                }
            },
            "required": ["role", "task"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: DelegateArgs = call.decode_arguments()?;
        let role = self
            .roles
            .get(&args.role)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: DELEGATE_TOOL_NAME.into(),
                reason: format!(
                    "unknown role '{}' (available: {})",
                    args.role,
                    self.role_names().join(", ")
                ),
            })?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: DELEGATE_TOOL_NAME.into(),
            reason,
        };

        let provider = self
            .providers
            .resolve(role.provider.as_deref(), role.model.as_deref())
            .map_err(|e| failed(format!("role '{}': {e}", args.role)))?;

        let child_cancel = self.cancel.child_token();
        let tools = self.child_tools(role, &child_cancel);
        debug!(role = %args.role, tools = ?tools.names(), "Sub-agent tools");

        let child = AgentLoop::new(provider, tools)
            .with_settings(&self.settings)
            .with_max_iterations(role.max_iterations)
            .with_events(self.events.clone())
            .with_cancellation(child_cancel);

        info!(role = %args.role, depth = self.depth + 1, "Delegating task");
        match child
            .run(&args.task, PriorHistory::None, &role.system_prompt)
            .await
        {
            Ok(result) => {
                info!(
                    role = %args.role,
                    iterations = result.iterations,
                    input_tokens = result.total_input_tokens,
                    output_tokens = result.total_output_tokens,
                    complete = result.is_complete(),
                    "Sub-agent finished"
                );
                Ok(result.text)
            }
            Err(Error::Cancelled { iterations }) => {
                warn!(role = %args.role, iterations, "Sub-agent cancelled");
                Err(failed(format!("sub-agent '{}' was cancelled", args.role)))
            }
            Err(e) => {
                warn!(role = %args.role, error = %e, "Sub-agent failed");
                Err(failed(format!("sub-agent '{}' failed: {e}", args.role)))
            }
        }
    }
}
