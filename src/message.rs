//! Conversation messages and the append-only message log
//!
//! The log is the unit of state threaded through every turn. It refuses any
//! append that would leave more than one tool call unanswered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A tool invocation proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One conversational message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Assistant message without tool calls (a final answer)
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant message proposing exactly one tool call
    pub fn assistant_tool_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: vec![call],
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::Tool {
            call_id: call_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Role name as used in logs
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content of the message
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// Rejected log append
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("tool result for {call_id} answers no pending call")]
    UnexpectedToolResult { call_id: String },
    #[error("tool result for {got} does not answer pending call {expected}")]
    MismatchedToolResult { expected: String, got: String },
    #[error("tool call {pending} is still unanswered")]
    CallInFlight { pending: String },
    #[error("assistant message proposes {count} tool calls; only one may be in flight")]
    MultipleToolCalls { count: usize },
}

/// Append-only ordered sequence of messages
///
/// Invariant: at most one tool call is unanswered, and while it is, the only
/// message that may be appended is the `Tool` message answering it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, enforcing the single-in-flight-call invariant
    pub fn append(&mut self, message: Message) -> Result<(), LogError> {
        let pending = self.pending_call().map(|call| call.id.clone());

        match (&message, pending) {
            (Message::Tool { call_id, .. }, None) => {
                return Err(LogError::UnexpectedToolResult {
                    call_id: call_id.clone(),
                });
            }
            (Message::Tool { call_id, .. }, Some(expected)) if *call_id != expected => {
                return Err(LogError::MismatchedToolResult {
                    expected,
                    got: call_id.clone(),
                });
            }
            (Message::Tool { .. }, Some(_)) => {}
            (_, Some(pending)) => return Err(LogError::CallInFlight { pending }),
            (Message::Assistant { tool_calls, .. }, None) if tool_calls.len() > 1 => {
                return Err(LogError::MultipleToolCalls {
                    count: tool_calls.len(),
                });
            }
            (_, None) => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// The tool call proposed by the last assistant message and not yet answered
    pub fn pending_call(&self) -> Option<&ToolCall> {
        let mut pending = None;
        for message in &self.messages {
            match message {
                Message::Assistant { tool_calls, .. } => pending = tool_calls.first(),
                Message::Tool { .. } => pending = None,
                Message::System { .. } | Message::User { .. } => {}
            }
        }
        pending
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl TryFrom<Vec<Message>> for MessageLog {
    type Error = LogError;

    fn try_from(messages: Vec<Message>) -> Result<Self, Self::Error> {
        let mut log = Self::new();
        for message in messages {
            log.append(message)?;
        }
        Ok(log)
    }
}

impl From<MessageLog> for Vec<Message> {
    fn from(log: MessageLog) -> Self {
        log.messages
    }
}
