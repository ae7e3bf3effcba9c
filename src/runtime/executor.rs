//! Turn executor
//!
//! Drives one turn: feeds events through the pure transition function and
//! performs the resulting effects until the turn answers, suspends or fails.

use super::traits::{ModelGateway, ToolExecutor};
use super::{TurnError, TurnOutcome};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::llm::{ModelOutcome, ToolDefinition};
use crate::message::{MessageLog, ToolCall};
use crate::state_machine::{
    transition, AbortReason, ConvContext, ConvState, Effect, Event, TransitionError,
};
use crate::tools::{ToolContext, ToolOutcome, ToolOutput};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// What performing one effect produced
enum Step {
    Continue,
    Next(Event),
    Finish(TurnOutcome),
}

/// Executes a single turn against borrowed collaborators
pub struct TurnExecutor<'a, G, T, S>
where
    G: ModelGateway,
    T: ToolExecutor,
    S: CheckpointStore,
{
    context: ConvContext,
    state: ConvState,
    log: MessageLog,
    gateway: &'a G,
    tools: &'a T,
    store: &'a S,
    definitions: Vec<ToolDefinition>,
    cancel: CancellationToken,
}

impl<'a, G, T, S> TurnExecutor<'a, G, T, S>
where
    G: ModelGateway,
    T: ToolExecutor,
    S: CheckpointStore,
{
    pub fn new(
        context: ConvContext,
        checkpoint: Checkpoint,
        gateway: &'a G,
        tools: &'a T,
        store: &'a S,
        cancel: CancellationToken,
    ) -> Self {
        let state = ConvState::from_checkpoint(&checkpoint);
        Self {
            context,
            state,
            log: checkpoint.log,
            gateway,
            tools,
            store,
            definitions: tools.definitions(),
            cancel,
        }
    }

    /// Run the turn started by `event` to completion
    pub async fn run(mut self, event: Event) -> Result<TurnOutcome, TurnError> {
        let mut pending = Some(event);

        while let Some(event) = pending.take() {
            let event_name = event.name();
            let resumed_call = match (&event, &self.state) {
                (Event::Resume { .. }, ConvState::Suspended { interrupt }) => {
                    Some(interrupt.call_id.clone())
                }
                _ => None,
            };
            let result = transition(&self.state, &self.context, event)?;

            if let Some(call_id) = resumed_call {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    call_id = %call_id,
                    "Turn resumed with human input"
                );
            }

            tracing::debug!(
                conv_id = %self.context.conversation_id,
                event = event_name,
                from = self.state.display_name(),
                to = result.new_state.display_name(),
                "State transition"
            );
            self.state = result.new_state;

            for effect in result.effects {
                match self.execute_effect(effect).await? {
                    Step::Continue => {}
                    Step::Next(next) => pending = Some(next),
                    Step::Finish(outcome) => return Ok(outcome),
                }
            }
        }

        Err(TransitionError::InvalidTransition(format!(
            "turn stopped in state {} without an outcome",
            self.state.display_name()
        ))
        .into())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Step, TurnError> {
        match effect {
            Effect::AppendMessage(message) => {
                self.log.append(message)?;
                Ok(Step::Continue)
            }

            Effect::PersistCheckpoint => {
                let checkpoint = Checkpoint {
                    log: self.log.clone(),
                    interrupt: self.state.pending_interrupt().cloned(),
                    updated_at: Utc::now(),
                };
                self.store
                    .save(&self.context.conversation_id, &checkpoint)
                    .await?;
                Ok(Step::Continue)
            }

            Effect::RequestModel => self.request_model().await,

            Effect::ExecuteTool { call } => Ok(Step::Next(self.execute_tool(call).await)),

            Effect::DiscardToolCalls { kept, discarded } => {
                let discarded_ids: Vec<_> = discarded.iter().map(|c| c.id.as_str()).collect();
                let discarded_names: Vec<_> =
                    discarded.iter().map(|c| c.name.as_str()).collect();
                tracing::warn!(
                    conv_id = %self.context.conversation_id,
                    kept_id = %kept.id,
                    kept_tool = %kept.name,
                    discarded_ids = ?discarded_ids,
                    discarded_tools = ?discarded_names,
                    "Model proposed multiple tool calls; executing only the first"
                );
                Ok(Step::Continue)
            }

            Effect::Reply { text } => Ok(Step::Finish(TurnOutcome::Final { text })),

            Effect::Interrupt { query } => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    call_id = %self.state.pending_interrupt().map_or("", |i| i.call_id.as_str()),
                    query = %query,
                    "Turn suspended for human input"
                );
                Ok(Step::Finish(TurnOutcome::Interrupted { query_text: query }))
            }

            Effect::Abort(AbortReason::RecursionLimit { limit }) => {
                Err(TurnError::RecursionLimit { limit })
            }

            Effect::Abort(AbortReason::Cancelled) => Err(TurnError::Cancelled),
        }
    }

    async fn request_model(&self) -> Result<Step, TurnError> {
        let round = match self.state {
            ConvState::ModelTurn { round } => round,
            _ => 0,
        };

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    round,
                    "Model request cancelled"
                );
                return Ok(Step::Next(Event::Cancelled));
            }
            result = self.gateway.propose(self.log.messages(), &self.definitions) => result,
        };

        let outcome = result?;
        match &outcome {
            ModelOutcome::Final { text } => tracing::info!(
                conv_id = %self.context.conversation_id,
                round,
                model = %self.gateway.model_id(),
                chars = text.len(),
                "Model proposed final answer"
            ),
            ModelOutcome::ToolCalls { calls, .. } => tracing::info!(
                conv_id = %self.context.conversation_id,
                round,
                model = %self.gateway.model_id(),
                calls = calls.len(),
                first_tool = calls.first().map_or("", |c| c.name.as_str()),
                "Model proposed tool calls"
            ),
        }

        Ok(Step::Next(Event::ModelProposal { outcome }))
    }

    async fn execute_tool(&self, call: ToolCall) -> Event {
        let ToolCall {
            id,
            name,
            arguments,
        } = call;
        let ctx = ToolContext::new(self.cancel.child_token(), self.context.conversation_id);

        tracing::info!(
            conv_id = %self.context.conversation_id,
            tool = %name,
            call_id = %id,
            "Tool execution started"
        );
        let start = std::time::Instant::now();

        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    tool = %name,
                    call_id = %id,
                    "Tool execution cancelled"
                );
                return Event::Cancelled;
            }
            outcome = self.tools.execute(&name, arguments, ctx) => outcome,
        };

        let outcome = outcome.unwrap_or_else(|| {
            tracing::warn!(conv_id = %self.context.conversation_id, tool = %name, "Unknown tool");
            ToolOutput::error(format!("Unknown tool: {name}")).into()
        });

        match outcome {
            ToolOutcome::Completed(output) => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    tool = %name,
                    call_id = %id,
                    success = output.success,
                    duration_ms = %start.elapsed().as_millis(),
                    "Tool execution finished"
                );
                Event::ToolCompleted {
                    call_id: id,
                    output,
                }
            }
            ToolOutcome::Suspend(signal) => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    tool = %name,
                    call_id = %id,
                    "Tool requested suspension"
                );
                Event::ToolSuspended {
                    call_id: id,
                    query: signal.query,
                }
            }
        }
    }
}
