//! Events that can occur in a conversation

use crate::llm::ModelOutcome;
use crate::tools::ToolOutput;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Session events
    UserMessage {
        text: String,
    },
    Resume {
        data: String,
    },
    Cancelled,

    // Gateway events
    ModelProposal {
        outcome: ModelOutcome,
    },

    // Tool events
    ToolCompleted {
        call_id: String,
        output: ToolOutput,
    },
    ToolSuspended {
        call_id: String,
        query: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::Resume { .. } => "resume",
            Event::Cancelled => "cancelled",
            Event::ModelProposal { .. } => "model_proposal",
            Event::ToolCompleted { .. } => "tool_completed",
            Event::ToolSuspended { .. } => "tool_suspended",
        }
    }
}
