//! Conversation state machine — pure decisions, no I/O.

pub mod event;
pub mod replies;
pub mod state;
pub mod transition;

pub use event::{Command, EventKind, InboundEvent, JobOutcome};
pub use state::ConversationState;
pub use transition::{Effect, GuardView, Outcome, transition};
