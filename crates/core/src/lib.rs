//! # forgeloop Core
//!
//! Canonical domain model for the forgeloop agent loop: messages, tool calls,
//! tool results, per-turn provider responses, vendor-shaped transcripts and
//! lifecycle events.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait defined here and implemented elsewhere:
//! - [`ProviderAdapter`] — one per wire-format family (`forgeloop-providers`)
//! - [`ProviderTransport`] — one per vendor endpoint (`forgeloop-providers`)
//! - [`ToolExecutor`] / [`Tool`] — tool capabilities (`forgeloop-tools`, `forgeloop-agent`)
//!
//! The agent loop (`forgeloop-agent`) only ever talks to these traits.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentOutcome, AgentResult, LoopState, PriorHistory};
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus};
pub use message::{Message, Role};
pub use provider::{
    Provider, ProviderAdapter, ProviderFamily, ProviderTransport, RawTurn, ToolResponse,
    Transcript, TurnRequest,
};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolExecutor, ToolRegistry, ToolResult};
