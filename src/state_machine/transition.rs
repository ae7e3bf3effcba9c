//! Pure state transition function
//!
//! Given the same state, context and event this always yields the same new
//! state and effects. All I/O happens in the executor.

use super::{AbortReason, ConvContext, ConvState, Effect, Event};
use crate::checkpoint::PendingInterrupt;
use crate::llm::ModelOutcome;
use crate::message::Message;
use thiserror::Error;

/// Content of the tool message that answers a call abandoned by cancellation
pub const CANCELLED_TOOL_CONTENT: &str = "[cancelled by user]";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Rejected events. Returned before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Agent is busy, cannot accept message")]
    AgentBusy,
    #[error("Conversation is waiting for a human answer; resume it instead")]
    AwaitingHumanInput,
    #[error("No pending interrupt to resume")]
    NoPendingInterrupt,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Session input
        // ============================================================
        (ConvState::AwaitingUser | ConvState::Done, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(ConvState::ModelTurn { round: 1 })
                .with_effect(Effect::append(Message::user(text)))
                .with_effect(Effect::PersistCheckpoint)
                .with_effect(Effect::RequestModel))
        }

        (ConvState::Suspended { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AwaitingHumanInput)
        }

        (ConvState::ModelTurn { .. } | ConvState::ToolTurn { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        // The human's answer stands in for the suspended tool's result
        (ConvState::Suspended { interrupt }, Event::Resume { data }) => {
            Ok(TransitionResult::new(ConvState::ModelTurn { round: 1 })
                .with_effect(Effect::append(Message::tool(
                    interrupt.call_id.clone(),
                    data,
                    false,
                )))
                .with_effect(Effect::PersistCheckpoint)
                .with_effect(Effect::RequestModel))
        }

        (_, Event::Resume { .. }) => Err(TransitionError::NoPendingInterrupt),

        // ============================================================
        // Model proposals
        // ============================================================
        (
            ConvState::ModelTurn { .. },
            Event::ModelProposal {
                outcome: ModelOutcome::Final { text },
            },
        ) => Ok(TransitionResult::new(ConvState::Done)
            .with_effect(Effect::append(Message::assistant(text.clone())))
            .with_effect(Effect::PersistCheckpoint)
            .with_effect(Effect::Reply { text })),

        (
            ConvState::ModelTurn { round },
            Event::ModelProposal {
                outcome: ModelOutcome::ToolCalls { content, calls },
            },
        ) => {
            let mut calls = calls.into_iter();
            let Some(first) = calls.next() else {
                return Err(TransitionError::InvalidTransition(
                    "model proposed an empty tool call list".to_string(),
                ));
            };
            let discarded: Vec<_> = calls.collect();

            let mut result = TransitionResult::new(ConvState::ToolTurn {
                call: first.clone(),
                round: *round,
            });
            if !discarded.is_empty() {
                result = result.with_effect(Effect::DiscardToolCalls {
                    kept: first.clone(),
                    discarded,
                });
            }
            Ok(result
                .with_effect(Effect::append(Message::assistant_tool_call(
                    content,
                    first.clone(),
                )))
                .with_effect(Effect::PersistCheckpoint)
                .with_effect(Effect::execute_tool(first)))
        }

        // ============================================================
        // Tool results
        // ============================================================
        (ConvState::ToolTurn { call, round }, Event::ToolCompleted { call_id, output })
            if call.id == call_id =>
        {
            let result = TransitionResult::new(ConvState::Done)
                .with_effect(Effect::append(Message::tool(
                    call_id,
                    output.output,
                    !output.success,
                )))
                .with_effect(Effect::PersistCheckpoint);

            if *round >= context.max_rounds {
                Ok(result.with_effect(Effect::Abort(AbortReason::RecursionLimit {
                    limit: context.max_rounds,
                })))
            } else {
                let mut result = result.with_effect(Effect::RequestModel);
                result.new_state = ConvState::ModelTurn { round: round + 1 };
                Ok(result)
            }
        }

        // Suspension: no tool message yet; the resume input will supply it
        (ConvState::ToolTurn { call, .. }, Event::ToolSuspended { call_id, query })
            if call.id == call_id =>
        {
            Ok(TransitionResult::new(ConvState::Suspended {
                interrupt: PendingInterrupt {
                    call_id,
                    query: query.clone(),
                },
            })
            .with_effect(Effect::PersistCheckpoint)
            .with_effect(Effect::Interrupt { query }))
        }

        (
            ConvState::ToolTurn { call, .. },
            Event::ToolCompleted { call_id, .. } | Event::ToolSuspended { call_id, .. },
        ) => Err(TransitionError::InvalidTransition(format!(
            "result for {call_id} does not match running tool {}",
            call.id
        ))),

        // ============================================================
        // Cancellation
        // ============================================================
        (ConvState::ModelTurn { .. }, Event::Cancelled) => Ok(TransitionResult::new(
            ConvState::Done,
        )
        .with_effect(Effect::Abort(AbortReason::Cancelled))),

        // Answer the dangling call so the log never holds an unanswered call
        (ConvState::ToolTurn { call, .. }, Event::Cancelled) => {
            Ok(TransitionResult::new(ConvState::Done)
                .with_effect(Effect::append(Message::tool(
                    call.id.clone(),
                    CANCELLED_TOOL_CONTENT,
                    true,
                )))
                .with_effect(Effect::PersistCheckpoint)
                .with_effect(Effect::Abort(AbortReason::Cancelled)))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} in state {}",
            event.name(),
            state.display_name()
        ))),
    }
}
