//! Conversation state types

use crate::checkpoint::{Checkpoint, ConversationId, PendingInterrupt};
use crate::message::ToolCall;

/// Default cap on model calls within one turn
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Turn controller state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConvState {
    /// Waiting for the first user message
    #[default]
    AwaitingUser,

    /// Model gateway call in flight; `round` counts gateway calls this turn
    ModelTurn { round: u32 },

    /// Exactly one tool call executing
    ToolTurn { call: ToolCall, round: u32 },

    /// Paused until a human answers the pending interrupt
    Suspended { interrupt: PendingInterrupt },

    /// Last turn finished (with an answer or an abort)
    Done,
}

impl ConvState {
    /// Rebuild the resting state from a stored checkpoint. Mid-turn states are
    /// never persisted, so a checkpoint is either suspended or idle.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        match &checkpoint.interrupt {
            Some(interrupt) => ConvState::Suspended {
                interrupt: interrupt.clone(),
            },
            None => ConvState::AwaitingUser,
        }
    }

    /// Whether a turn is in progress
    pub fn is_busy(&self) -> bool {
        matches!(self, ConvState::ModelTurn { .. } | ConvState::ToolTurn { .. })
    }

    /// The interrupt to persist alongside the log
    pub fn pending_interrupt(&self) -> Option<&PendingInterrupt> {
        match self {
            ConvState::Suspended { interrupt } => Some(interrupt),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConvState::AwaitingUser => "awaiting_user",
            ConvState::ModelTurn { .. } => "model_turn",
            ConvState::ToolTurn { .. } => "tool_turn",
            ConvState::Suspended { .. } => "suspended",
            ConvState::Done => "done",
        }
    }
}

/// Per-conversation context passed into every transition
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: ConversationId,
    /// Maximum model gateway calls per turn
    pub max_rounds: u32,
}

impl ConvContext {
    pub fn new(conversation_id: ConversationId, max_rounds: u32) -> Self {
        Self {
            conversation_id,
            max_rounds: max_rounds.max(1),
        }
    }
}
