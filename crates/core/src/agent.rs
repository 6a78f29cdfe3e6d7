//! Agent run inputs, outcomes, and the loop state machine.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::provider::Transcript;

/// What a run starts from besides the new user message.
#[derive(Debug, Clone, Default)]
pub enum PriorHistory {
    /// A fresh conversation
    #[default]
    None,
    /// Plain messages, converted into the provider family's shape
    Messages(Vec<Message>),
    /// A transcript returned by an earlier run against the same family
    Transcript(Transcript),
}

/// How a run that returned an [`AgentResult`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The model produced a turn without tool calls
    Completed,
    /// The iteration cap was reached while the model still wanted tools
    StepBudgetExceeded,
}

/// The result of one agent loop run.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final answer, or the step-budget explanation
    pub text: String,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// The full vendor-shaped transcript, suitable for seeding the next run
    pub transcript: Transcript,
    pub outcome: AgentOutcome,
    /// Provider calls made during this run
    pub iterations: u32,
}

impl AgentResult {
    pub fn is_complete(&self) -> bool {
        self.outcome == AgentOutcome::Completed
    }
}

/// States of one agent loop instance.
///
/// `Idle → Requesting → (ToolsPending → Dispatching → Requesting)* → terminal`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Requesting,
    ToolsPending,
    Dispatching,
    Done,
    StepBudgetExceeded,
    Cancelled,
    /// The response arrived but did not have the family's shape
    ParseFailed,
    /// The request never produced a response (network, auth, rate limit)
    TransportFailed,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Done
                | LoopState::StepBudgetExceeded
                | LoopState::Cancelled
                | LoopState::ParseFailed
                | LoopState::TransportFailed
        )
    }

    /// The terminal state a failed provider turn ends in.
    pub fn after_provider_error(error: &ProviderError) -> LoopState {
        match error {
            ProviderError::MalformedResponse(_) => LoopState::ParseFailed,
            _ => LoopState::TransportFailed,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        match (*self, next) {
            (Idle, Requesting) | (Idle, Cancelled) => true,
            (Requesting, ToolsPending | Done | ParseFailed | TransportFailed) => true,
            (ToolsPending, Dispatching) => true,
            (Dispatching, Requesting | StepBudgetExceeded | Cancelled) => true,
            _ => false,
        }
    }
}
