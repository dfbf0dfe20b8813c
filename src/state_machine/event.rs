//! Events that drive the session and conversation machines

use crate::gateway::{AuthMode, ChatReply, Credentials, GatewayErrorKind};
use crate::storage::RestoredSession;

/// Events that trigger session transitions
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Persisted storage has been read (`None` when absent or corrupt)
    Restored { record: Option<RestoredSession> },

    // User events
    AuthRequested {
        mode: AuthMode,
        credentials: Credentials,
        remember: bool,
    },
    ErrorDismissed,
    LogoutRequested,

    // Gateway events
    AuthSucceeded { is_elevated: bool },
    AuthFailed { message: String },
}

/// Events that trigger conversation transitions
#[derive(Debug, Clone)]
pub enum ConvEvent {
    // User events
    UserSubmit { text: String },

    // Gateway events
    AnswerReceived { reply: ChatReply },
    ExchangeFailed {
        kind: GatewayErrorKind,
        message: String,
    },
}
