//! Human assistance tool: pauses the turn and asks the user a question

use super::{SuspendSignal, Tool, ToolContext, ToolOutcome, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const NAME: &str = "human_assistance";

/// Suspends the turn with the model's question; the human's answer becomes
/// the tool result on resume.
pub struct HumanAssistanceTool;

#[derive(Debug, Deserialize)]
struct HumanAssistanceInput {
    query: String,
}

#[async_trait]
impl Tool for HumanAssistanceTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        "Request assistance from a human. Use this whenever you are uncertain, \
         the request is ambiguous, or you need details only the user can provide."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to ask the human"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutcome {
        match serde_json::from_value::<HumanAssistanceInput>(input) {
            Ok(HumanAssistanceInput { query }) => {
                tracing::info!(
                    conv_id = %ctx.conversation_id,
                    query = %query,
                    "Requesting human assistance"
                );
                ToolOutcome::Suspend(SuspendSignal { query })
            }
            Err(e) => ToolOutput::error(format!("Invalid input: {e}")).into(),
        }
    }
}
