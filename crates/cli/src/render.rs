//! Terminal rendering of agent events.
//!
//! A background task subscribes to the event bus and writes progress lines
//! to stderr. Answers themselves are printed by the command on stdout.

use forgeloop_core::event::{AgentEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// The stderr line for `event`, if it has one.
pub fn line(event: &AgentEvent, verbose: bool) -> Option<String> {
    match event {
        AgentEvent::Thinking => verbose.then(|| "  … thinking".to_string()),
        AgentEvent::ToolStart { name, args } => Some(format!("  → {name} {args}")),
        AgentEvent::ToolDone { name, summary } => Some(format!("  ✓ {name}: {summary}")),
        AgentEvent::Error { value } => Some(format!("  ! {value}")),
        AgentEvent::Usage { input, output } => {
            verbose.then(|| format!("  tokens: {input} in / {output} out"))
        }
        AgentEvent::Text { .. } => None,
    }
}

/// Print events until the bus is dropped.
pub fn spawn(events: &EventBus, verbose: bool) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(text) = line(&event, verbose) {
                        eprintln!("{text}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event renderer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
