//! Effects produced by state transitions

use super::state::Turn;
use crate::gateway::{AuthMode, Credentials};
use crate::storage::{PersistedSession, Tier};

/// Session effects to be executed after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Call the credential endpoint
    RequestCredentials {
        mode: AuthMode,
        credentials: Credentials,
    },

    /// Write the record to `tier`, clearing the other tier
    PersistSession {
        tier: Tier,
        record: PersistedSession,
    },

    /// Remove the record from both tiers
    ClearPersistedSession,
}

/// Conversation effects to be executed after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvEffect {
    /// Issue one message exchange
    RequestAnswer { message: String },

    /// Notify the rendering layer
    Notify(ViewEvent),
}

/// Changes the rendering layer reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    TurnAppended { turn: Turn },
    /// The input buffer should be emptied
    InputCleared,
    PendingChanged { pending: bool },
}

impl ConvEffect {
    pub fn turn_appended(turn: Turn) -> Self {
        ConvEffect::Notify(ViewEvent::TurnAppended { turn })
    }

    pub fn pending_changed(pending: bool) -> Self {
        ConvEffect::Notify(ViewEvent::PendingChanged { pending })
    }
}
