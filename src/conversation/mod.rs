//! Per-user submission conversation.
//!
//! The conversation is a linear state machine collecting the fields of one
//! submission. `transition` is a pure function from state + event to a new
//! state and a list of effects; `SessionStore` owns the live per-user
//! sessions and serializes events per user.

mod event;
mod sessions;
mod state;
mod transition;

pub use event::UserEvent;
pub use sessions::{Session, SessionStore};
pub use state::{ConversationState, Draft};
pub use transition::{transition, Effect, Step, TransitionContext, TransitionResult};
