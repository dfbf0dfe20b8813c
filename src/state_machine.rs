//! Session and conversation state machines
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! Runtimes in `crate::runtime` execute the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{ConvEffect, SessionEffect, ViewEvent};
pub use event::{ConvEvent, SessionEvent};
pub use state::{
    Conversation, ExchangeState, PersistenceScope, Role, Session, SessionState, Speaker, Stamp,
    Transcript, Turn, TurnId,
};
pub use transition::{
    conversation_transition, initialize_conversation, session_transition, TransitionError,
};
