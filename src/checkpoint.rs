//! Conversation checkpoints
//!
//! A checkpoint is the latest message log plus the pending interrupt, keyed by
//! conversation identity. It is everything needed to resume a suspended turn.

use crate::message::MessageLog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque conversation identity, created once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A tool call awaiting human input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub call_id: String,
    pub query: String,
}

/// Persisted snapshot of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub log: MessageLog,
    #[serde(default)]
    pub interrupt: Option<PendingInterrupt>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(log: MessageLog) -> Self {
        Self {
            log,
            interrupt: None,
            updated_at: Utc::now(),
        }
    }
}

/// Error type for checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint for conversation {0}")]
    NotFound(ConversationId),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Saves and loads the latest checkpoint per conversation
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, id: &ConversationId) -> Result<Checkpoint, CheckpointError>;

    async fn save(&self, id: &ConversationId, checkpoint: &Checkpoint)
        -> Result<(), CheckpointError>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn load(&self, id: &ConversationId) -> Result<Checkpoint, CheckpointError> {
        (**self).load(id).await
    }

    async fn save(
        &self,
        id: &ConversationId,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        (**self).save(id, checkpoint).await
    }
}

/// In-process store. Checkpoints are held as serialized JSON so a load never
/// aliases a caller's copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<RwLock<HashMap<ConversationId, String>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, id: &ConversationId) -> Result<Checkpoint, CheckpointError> {
        let guard = self.inner.read().await;
        let raw = guard.get(id).ok_or(CheckpointError::NotFound(*id))?;
        Ok(serde_json::from_str(raw)?)
    }

    async fn save(
        &self,
        id: &ConversationId,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        let raw = serde_json::to_string(checkpoint)?;
        self.inner.write().await.insert(*id, raw);
        Ok(())
    }
}
