//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmService, ModelOutcome, ToolDefinition};
use crate::message::Message;
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The language-model capability as the turn controller sees it
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Given the history and the declared tools, propose the next step
    async fn propose(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutcome, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Executor for tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool by name; `None` if no such tool exists
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutcome>;

    /// Get tool definitions for the model
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ModelGateway + ?Sized> ModelGateway for Arc<T> {
    async fn propose(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutcome, LlmError> {
        (**self).propose(history, tools).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutcome> {
        (**self).execute(name, input, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use any `LlmService` as a `ModelGateway`
pub struct ServiceGateway {
    service: Arc<dyn LlmService>,
    max_tokens: Option<u32>,
}

impl ServiceGateway {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self {
            service,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl ModelGateway for ServiceGateway {
    async fn propose(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutcome, LlmError> {
        let request = LlmRequest {
            messages: history.to_vec(),
            tools: tools.to_vec(),
            max_tokens: self.max_tokens,
        };
        let response = self.service.complete(&request).await?;
        Ok(response.into_outcome())
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutcome> {
        ToolRegistry::execute(self, name, input, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::definitions(self)
    }
}
