//! Agent lifecycle events — the observability side channel of a loop run.
//!
//! Events never influence control flow. They are published on a broadcast
//! bus: publishing never waits, and a subscriber that falls behind loses the
//! oldest events (it sees `RecvError::Lagged`) instead of stalling the loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Maximum length of a tool output summary carried in [`AgentEvent::ToolDone`].
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Events emitted by an agent loop during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A provider request is about to be sent.
    Thinking,

    /// A tool call from the current turn is queued for dispatch.
    ToolStart {
        name: String,
        args: serde_json::Value,
    },

    /// A tool call finished (successfully or with an error string).
    ToolDone { name: String, summary: String },

    /// The final answer text.
    Text { value: String },

    /// A terminal problem (step budget exhausted, provider failure).
    Error { value: String },

    /// Token usage of one provider turn.
    Usage { input: u64, output: u64 },
}

impl AgentEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolDone { .. } => "tool_done",
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
            Self::Usage { .. } => "usage",
        }
    }

    /// Build a `ToolDone` whose summary is the first line of `output`, capped.
    pub fn tool_done(name: impl Into<String>, output: &str) -> Self {
        let first_line = output.lines().next().unwrap_or("");
        let mut summary: String = first_line.chars().take(SUMMARY_MAX_CHARS).collect();
        if summary.len() < first_line.len() || output.lines().nth(1).is_some() {
            summary.push('…');
        }
        Self::ToolDone {
            name: name.into(),
            summary,
        }
    }
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Cloning the bus
/// shares the underlying channel, so nested agents publish to the same sink.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
