//! The agent loop: request a turn, run its tools, continue, until the model
//! answers without tool calls or the step budget runs out.

use std::sync::Arc;

use forgeloop_config::AgentSettings;
use forgeloop_core::agent::{AgentOutcome, AgentResult, LoopState, PriorHistory};
use forgeloop_core::error::{Error, Result};
use forgeloop_core::event::{AgentEvent, EventBus};
use forgeloop_core::provider::{Provider, Transcript};
use forgeloop_core::tool::{ToolDefinition, ToolExecutor, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::dispatcher::ToolDispatcher;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

pub const DEFAULT_STEP_BUDGET_MESSAGE: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// The core agent loop that orchestrates LLM calls and tool execution.
///
/// One instance may run many times; each [`run`](Self::run) is independent
/// apart from the transcript the caller chooses to pass back in.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Provider,

    /// Runs the calls the model makes
    executor: Arc<dyn ToolExecutor>,

    /// Tool definitions sent with every request
    catalog: Vec<ToolDefinition>,

    dispatcher: ToolDispatcher,

    /// Maximum provider calls per run
    max_iterations: u32,

    events: EventBus,

    cancel: CancellationToken,

    step_budget_message: Option<String>,
}

impl AgentLoop {
    /// Create a loop whose tools come from `tools`.
    pub fn new(provider: Provider, tools: ToolRegistry) -> Self {
        let catalog = tools.definitions();
        Self::with_executor(provider, Arc::new(tools), catalog)
    }

    /// Create a loop from any executor plus the catalog to advertise.
    pub fn with_executor(
        provider: Provider,
        executor: Arc<dyn ToolExecutor>,
        catalog: Vec<ToolDefinition>,
    ) -> Self {
        let events = EventBus::default();
        Self {
            provider,
            executor,
            catalog,
            dispatcher: ToolDispatcher::default().with_events(events.clone()),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            events,
            cancel: CancellationToken::new(),
            step_budget_message: None,
        }
    }

    /// Set the maximum number of provider calls per run (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: ToolDispatcher) -> Self {
        self.dispatcher = dispatcher.with_events(self.events.clone());
        self
    }

    /// Publish lifecycle events on `events` instead of a private bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.dispatcher = self.dispatcher.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the answer returned when the step budget runs out.
    pub fn with_step_budget_message(mut self, message: impl Into<String>) -> Self {
        self.step_budget_message = Some(message.into());
        self
    }

    /// Apply the `[agent]` section of the configuration.
    pub fn with_settings(mut self, settings: &AgentSettings) -> Self {
        self = self
            .with_max_iterations(settings.max_iterations)
            .with_dispatcher(
                ToolDispatcher::new(settings.priority_tools.iter().cloned())
                    .with_max_concurrency(settings.max_concurrency),
            );
        self.step_budget_message = settings.step_budget_message.clone();
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The token that cancels this loop's runs.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one user message to completion.
    ///
    /// Returns `Ok` for a final answer and for an exhausted step budget
    /// (see [`AgentResult::outcome`]). Provider failures, malformed
    /// responses and cancellation are errors.
    pub async fn run(
        &self,
        user_message: &str,
        prior: PriorHistory,
        system_prompt: &str,
    ) -> Result<AgentResult> {
        let adapter = self.provider.adapter();
        info!(provider = %self.provider.name(), family = %adapter.family(), "Processing conversation");

        let mut transcript = match prior {
            PriorHistory::None => adapter.seed(&[], user_message)?,
            PriorHistory::Messages(history) => adapter.seed(&history, user_message)?,
            PriorHistory::Transcript(mut transcript) => {
                transcript.ensure_family(adapter.family())?;
                adapter.append_user(&mut transcript, user_message)?;
                transcript
            }
        };

        let mut state = LoopState::Idle;
        let mut iterations = 0u32;
        let mut total_input_tokens = 0u64;
        let mut total_output_tokens = 0u64;

        while iterations < self.max_iterations {
            if self.cancel.is_cancelled() {
                transition(&mut state, LoopState::Cancelled);
                info!(iterations, "Agent run cancelled");
                return Err(Error::Cancelled { iterations });
            }

            transition(&mut state, LoopState::Requesting);
            iterations += 1;
            debug!(iteration = iterations, entries = transcript.len(), "Agent loop iteration");
            self.events.publish(AgentEvent::Thinking);

            let response = match self
                .provider
                .generate(&transcript, system_prompt, &self.catalog)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    transition(&mut state, LoopState::after_provider_error(&e));
                    warn!(iteration = iterations, error = %e, "Provider turn failed");
                    self.events.publish(AgentEvent::Error {
                        value: e.to_string(),
                    });
                    return Err(e.into());
                }
            };

            total_input_tokens += response.input_tokens;
            total_output_tokens += response.output_tokens;
            self.events.publish(AgentEvent::Usage {
                input: response.input_tokens,
                output: response.output_tokens,
            });

            if !response.has_tool_calls() {
                transition(&mut state, LoopState::Done);
                let text = response.text_or_empty().to_string();
                adapter.append_final(&mut transcript, &response)?;
                self.events.publish(AgentEvent::Text {
                    value: text.clone(),
                });
                info!(
                    iterations,
                    total_input_tokens, total_output_tokens, "Agent run complete"
                );
                return Ok(AgentResult {
                    text,
                    total_input_tokens,
                    total_output_tokens,
                    transcript,
                    outcome: AgentOutcome::Completed,
                    iterations,
                });
            }

            transition(&mut state, LoopState::ToolsPending);
            for call in &response.tool_calls {
                debug!(tool = %call.name, call_id = %call.id, "Tool call requested");
                self.events.publish(AgentEvent::ToolStart {
                    name: call.name.clone(),
                    args: call.arguments_value(),
                });
            }

            transition(&mut state, LoopState::Dispatching);
            let results = self
                .dispatcher
                .dispatch(&response.tool_calls, self.executor.as_ref())
                .await;
            adapter.build_continuation(&mut transcript, &response, &results)?;
        }

        transition(&mut state, LoopState::StepBudgetExceeded);
        warn!(max = self.max_iterations, "Max tool iterations reached");
        let text = self
            .step_budget_message
            .clone()
            .unwrap_or_else(|| DEFAULT_STEP_BUDGET_MESSAGE.to_string());
        self.events.publish(AgentEvent::Error {
            value: text.clone(),
        });

        Ok(AgentResult {
            text,
            total_input_tokens,
            total_output_tokens,
            transcript,
            outcome: AgentOutcome::StepBudgetExceeded,
            iterations,
        })
    }

    /// Continue a previous run's transcript with a new user message.
    pub async fn resume(
        &self,
        transcript: Transcript,
        user_message: &str,
        system_prompt: &str,
    ) -> Result<AgentResult> {
        self.run(user_message, PriorHistory::Transcript(transcript), system_prompt)
            .await
    }
}

fn transition(state: &mut LoopState, next: LoopState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal loop transition {state:?} -> {next:?}"
    );
    trace!(from = ?state, to = ?next, "Loop state");
    *state = next;
}
