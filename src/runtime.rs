//! Runtimes that execute state machine effects
//!
//! `SessionManager` drives sign-in and persistence; `ConversationRuntime`
//! runs the chat exchange loop for an authenticated session.

mod conversation;
mod session;

pub use conversation::{ConversationClosed, ConversationHandle, ConversationRuntime};
pub use session::SessionManager;
