//! Effects produced by state transitions

use crate::message::{Message, ToolCall};

/// Why a turn stopped without an answer or a suspension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    RecursionLimit { limit: u32 },
    Cancelled,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the conversation log
    AppendMessage(Message),

    /// Save the log and the pending interrupt (if any) to the checkpoint store
    PersistCheckpoint,

    /// Ask the model gateway for its next proposal
    RequestModel,

    /// Execute exactly one tool call
    ExecuteTool { call: ToolCall },

    /// Record the tool calls dropped by the sequentialization rule
    DiscardToolCalls {
        kept: ToolCall,
        discarded: Vec<ToolCall>,
    },

    /// End the turn with a final answer
    Reply { text: String },

    /// End the turn suspended on a human question
    Interrupt { query: String },

    /// End the turn with an error
    Abort(AbortReason),
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage(message)
    }

    pub fn execute_tool(call: ToolCall) -> Self {
        Effect::ExecuteTool { call }
    }

    /// Whether this effect ends the turn
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Effect::Reply { .. } | Effect::Interrupt { .. } | Effect::Abort(_)
        )
    }
}
