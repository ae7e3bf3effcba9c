//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function decides, the executor performs the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{AbortReason, Effect};
pub use event::Event;
pub use state::{ConvContext, ConvState};
pub use transition::{transition, TransitionError, TransitionResult};
