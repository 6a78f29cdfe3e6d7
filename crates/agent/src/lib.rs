//! The forgeloop agent loop.
//!
//! The loop follows a **request → act → continue** cycle:
//!
//! 1. **Seed** a vendor-shaped transcript from prior history and the user message
//! 2. **Request** one turn from the provider with the tool catalog
//! 3. **If tool calls**: dispatch them (priority tools first, the rest
//!    concurrently), append the continuation, loop back to step 2
//! 4. **If text only**: append the final turn and return it
//!
//! The loop ends when the model answers without tool calls, when the step
//! budget is spent, or when its cancellation token fires.
//!
//! Sub-agents are reached through the [`DelegateTool`], which runs a fresh
//! [`AgentLoop`] per delegated task.

pub mod delegation;
pub mod dispatcher;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use delegation::{DELEGATE_TOOL_NAME, DelegateTool, ProviderResolver};
pub use dispatcher::{ToolDispatcher, dispatch};
pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, DEFAULT_STEP_BUDGET_MESSAGE};
pub use tokio_util::sync::CancellationToken;
