//! Runtime for executing conversation turns
//!
//! [`Agent`] is the entry point the session shell talks to. Each `submit` or
//! `resume` loads the conversation's checkpoint, runs one turn through the
//! executor and returns how the turn ended.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::TurnExecutor;
pub use traits::*;

use crate::checkpoint::{
    Checkpoint, CheckpointError, CheckpointStore, ConversationId, PendingInterrupt,
};
use crate::llm::LlmError;
use crate::message::{LogError, Message, MessageLog};
use crate::state_machine::state::DEFAULT_MAX_ROUNDS;
use crate::state_machine::{ConvContext, Event, TransitionError};
use crate::system_prompt::SYSTEM_PROMPT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How a turn ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    Final { text: String },
    Interrupted { query_text: String },
}

/// Errors surfaced by `submit` and `resume`
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model gateway failed: {0}")]
    Gateway(#[from] LlmError),
    #[error("Recursion limit of {limit} model calls reached")]
    RecursionLimit { limit: u32 },
    #[error("No pending interrupt to resume")]
    NoPendingInterrupt,
    #[error("Conversation is waiting for a human answer")]
    AwaitingHumanInput,
    #[error("A turn is already running for conversation {0}")]
    Conflict(ConversationId),
    #[error("Turn cancelled")]
    Cancelled,
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Message log error: {0}")]
    Log(#[from] LogError),
    #[error(transparent)]
    Rejected(TransitionError),
}

impl From<TransitionError> for TurnError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NoPendingInterrupt => TurnError::NoPendingInterrupt,
            TransitionError::AwaitingHumanInput => TurnError::AwaitingHumanInput,
            other => TurnError::Rejected(other),
        }
    }
}

/// Agent-wide settings
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Maximum model calls per turn
    pub max_rounds: u32,
    /// System message seeded into every new conversation
    pub system_prompt: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Conversational agent with interrupt/resume support
pub struct Agent<G, T, S>
where
    G: ModelGateway,
    T: ToolExecutor,
    S: CheckpointStore,
{
    gateway: G,
    tools: T,
    store: S,
    options: AgentOptions,
    /// Conversations with a turn in progress, with their cancel tokens
    in_flight: Mutex<HashMap<ConversationId, CancellationToken>>,
}

/// Marks a conversation busy for the lifetime of one turn
struct TurnGuard<'a> {
    in_flight: &'a Mutex<HashMap<ConversationId, CancellationToken>>,
    id: ConversationId,
    cancel: CancellationToken,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl<G, T, S> Agent<G, T, S>
where
    G: ModelGateway,
    T: ToolExecutor,
    S: CheckpointStore,
{
    pub fn new(gateway: G, tools: T, store: S, options: AgentOptions) -> Self {
        Self {
            gateway,
            tools,
            store,
            options,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh conversation seeded with the system prompt
    pub async fn create_conversation(&self) -> Result<ConversationId, TurnError> {
        let id = ConversationId::new();
        let mut log = MessageLog::new();
        if !self.options.system_prompt.is_empty() {
            log.append(Message::system(self.options.system_prompt.clone()))?;
        }
        self.store.save(&id, &Checkpoint::new(log)).await?;
        tracing::info!(conv_id = %id, "Conversation created");
        Ok(id)
    }

    /// Start a turn with a new user message
    pub async fn submit(
        &self,
        id: &ConversationId,
        text: impl Into<String>,
    ) -> Result<TurnOutcome, TurnError> {
        self.run_turn(id, Event::UserMessage { text: text.into() })
            .await
    }

    /// Continue a suspended turn with the human's answer
    pub async fn resume(
        &self,
        id: &ConversationId,
        data: impl Into<String>,
    ) -> Result<TurnOutcome, TurnError> {
        self.run_turn(id, Event::Resume { data: data.into() }).await
    }

    /// Cancel the turn running for `id`. Returns false if none is running.
    pub fn cancel(&self, id: &ConversationId) -> bool {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match in_flight.get(id) {
            Some(token) => {
                tracing::info!(conv_id = %id, "Cancelling turn");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a turn is currently running for `id`
    pub fn is_busy(&self, id: &ConversationId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Full message history of a conversation
    pub async fn history(&self, id: &ConversationId) -> Result<Vec<Message>, TurnError> {
        let checkpoint = self.store.load(id).await?;
        Ok(checkpoint.log.into())
    }

    /// The question a suspended conversation is waiting on, if any
    pub async fn pending_interrupt(
        &self,
        id: &ConversationId,
    ) -> Result<Option<PendingInterrupt>, TurnError> {
        Ok(self.store.load(id).await?.interrupt)
    }

    fn begin_turn(&self, id: &ConversationId) -> Result<TurnGuard<'_>, TurnError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains_key(id) {
            return Err(TurnError::Conflict(*id));
        }
        let cancel = CancellationToken::new();
        in_flight.insert(*id, cancel.clone());
        Ok(TurnGuard {
            in_flight: &self.in_flight,
            id: *id,
            cancel,
        })
    }

    async fn run_turn(&self, id: &ConversationId, event: Event) -> Result<TurnOutcome, TurnError> {
        let guard = self.begin_turn(id)?;
        let checkpoint = self.store.load(id).await?;

        tracing::info!(
            conv_id = %id,
            event = event.name(),
            messages = checkpoint.log.len(),
            "Turn started"
        );

        let context = ConvContext::new(*id, self.options.max_rounds);
        let executor = TurnExecutor::new(
            context,
            checkpoint,
            &self.gateway,
            &self.tools,
            &self.store,
            guard.cancel.clone(),
        );
        let result = executor.run(event).await;

        match &result {
            Ok(TurnOutcome::Final { .. }) => tracing::info!(conv_id = %id, "Turn answered"),
            Ok(TurnOutcome::Interrupted { .. }) => {
                tracing::info!(conv_id = %id, "Turn interrupted");
            }
            Err(e) => tracing::warn!(conv_id = %id, error = %e, "Turn failed"),
        }

        drop(guard);
        result
    }
}
