//! Tools the model may invoke
//!
//! Tools are stateless singletons; everything call-specific arrives through
//! [`ToolContext`]. A tool either completes with a [`ToolOutput`] or asks the
//! turn to suspend until a human answers.

mod human_assistance;
mod web_search;

pub use human_assistance::HumanAssistanceTool;
pub use web_search::WebSearchTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::ConversationId;
use crate::llm::ToolDefinition;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Request to pause the whole turn until external input arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendSignal {
    pub query: String,
}

/// What running a tool produced
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Completed(ToolOutput),
    Suspend(SuspendSignal),
}

impl From<ToolOutput> for ToolOutcome {
    fn from(output: ToolOutput) -> Self {
        Self::Completed(output)
    }
}

/// Per-call context injected into every tool invocation
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,

    /// The conversation this tool is executing within
    pub conversation_id: ConversationId,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, conversation_id: ConversationId) -> Self {
        Self {
            cancel,
            conversation_id,
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool. Long-running tools should watch `ctx.cancel`.
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutcome;
}

/// Fixed, ordered set of tools available to a conversation
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Standard registry: web search first when enabled, then human assistance
    pub fn standard(search: Option<WebSearchTool>) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(2);
        if let Some(search) = search {
            tools.push(Arc::new(search));
        }
        tools.push(Arc::new(HumanAssistanceTool));
        Self { tools }
    }

    /// Get all tool definitions for the model, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name; `None` if no such tool is registered
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutcome> {
        let tool = self.tools.iter().find(|tool| tool.name() == name)?;
        Some(tool.run(input, ctx).await)
    }
}
