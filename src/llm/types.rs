//! Common types for model gateway interactions

use crate::message::{Message, ToolCall};
use serde::{Deserialize, Serialize};

/// Completion request: the full message history plus the declared tools
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
}

/// Content block in a model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Raw model response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

impl LlmResponse {
    /// Get text content from the response
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool invocations, in the order the model proposed them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(id.clone(), name.clone(), input.clone()))
                }
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }

    /// Collapse into the two-way decision the turn controller routes on
    pub fn into_outcome(self) -> ModelOutcome {
        let text = self.text();
        let calls = self.tool_calls();
        if calls.is_empty() {
            ModelOutcome::Final { text }
        } else {
            ModelOutcome::ToolCalls {
                content: text,
                calls,
            }
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// What the model decided to do next
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    /// Terminal answer
    Final { text: String },
    /// One or more proposed tool invocations (never empty)
    ToolCalls { content: String, calls: Vec<ToolCall> },
}
