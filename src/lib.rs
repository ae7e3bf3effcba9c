//! Human-in-the-loop conversational agent
//!
//! A turn controller that routes between the language model and tools one
//! call at a time, and can suspend a turn mid-flight to ask a human for input
//! and later resume exactly where it stopped.

pub mod checkpoint;
pub mod config;
pub mod llm;
pub mod message;
pub mod runtime;
pub mod state_machine;
pub mod system_prompt;
pub mod tools;

pub use checkpoint::{ConversationId, MemoryCheckpointStore, PendingInterrupt};
pub use runtime::{Agent, AgentOptions, TurnError, TurnOutcome};
