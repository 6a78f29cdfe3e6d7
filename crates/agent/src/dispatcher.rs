//! Tool dispatch for one model turn.
//!
//! Calls whose names are in the priority set run first, one at a time, in
//! the order the model emitted them. The remaining calls then run
//! concurrently. Results always come back in the original call order, and a
//! failing call becomes an `"Error: …"` result instead of aborting the turn.

use std::collections::HashSet;

use forgeloop_core::event::{AgentEvent, EventBus};
use forgeloop_core::tool::{ToolCall, ToolExecutor, ToolResult};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, warn};

/// Executes the tool calls of one turn.
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    priority: HashSet<String>,
    max_concurrency: Option<usize>,
    events: Option<EventBus>,
}

impl ToolDispatcher {
    pub fn new<I, S>(priority_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            priority: priority_names.into_iter().map(Into::into).collect(),
            max_concurrency: None,
            events: None,
        }
    }

    /// Cap the number of normal calls in flight at once.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.map(|l| l.max(1));
        self
    }

    /// Publish a `ToolDone` event as each call finishes.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_priority(&self, name: &str) -> bool {
        self.priority.contains(name)
    }

    /// Run every call and return one result per call, in call order.
    pub async fn dispatch(&self, calls: &[ToolCall], executor: &dyn ToolExecutor) -> Vec<ToolResult> {
        let (priority, normal): (Vec<usize>, Vec<usize>) =
            (0..calls.len()).partition(|&i| self.is_priority(&calls[i].name));

        debug!(
            priority = priority.len(),
            normal = normal.len(),
            "Dispatching tool calls"
        );

        let mut slots: Vec<Option<ToolResult>> = vec![None; calls.len()];

        for &i in &priority {
            slots[i] = Some(self.run_one(&calls[i], executor).await);
        }

        if !normal.is_empty() {
            let limit = self.max_concurrency.unwrap_or(normal.len());
            let finished: Vec<(usize, ToolResult)> = stream::iter(normal)
                .map(|i| async move { (i, self.run_one(&calls[i], executor).await) })
                .buffered(limit)
                .collect()
                .await;
            for (i, result) in finished {
                slots[i] = Some(result);
            }
        }

        slots.into_iter().flatten().collect()
    }

    async fn run_one(&self, call: &ToolCall, executor: &dyn ToolExecutor) -> ToolResult {
        let result = match executor.execute(call).await {
            Ok(output) => ToolResult::success(call.clone(), output),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                ToolResult::failure(call.clone(), &e)
            }
        };
        if let Some(events) = &self.events {
            events.publish(AgentEvent::tool_done(&call.name, &result.output));
        }
        result
    }
}

/// Dispatch one turn with an unbounded, event-less dispatcher.
pub async fn dispatch(
    calls: &[ToolCall],
    executor: &dyn ToolExecutor,
    priority_names: &HashSet<String>,
) -> Vec<ToolResult> {
    ToolDispatcher::new(priority_names.iter().cloned())
        .dispatch(calls, executor)
        .await
}
