//! Session and conversation state types

use crate::gateway::AuthMode;
use crate::messages::DEFAULT_DISPLAY_NAME;
use crate::storage::{PersistedSession, RestoredSession, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Session
// ============================================================================

/// Role passed through to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Standard,
    Elevated,
}

impl Role {
    pub fn from_elevated(is_elevated: bool) -> Self {
        if is_elevated {
            Role::Elevated
        } else {
            Role::Standard
        }
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Elevated)
    }
}

/// How long an authenticated session survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceScope {
    /// Memory only
    #[default]
    None,
    /// Survives reloads within one terminal session
    Session,
    /// Survives restarts
    Durable,
}

impl PersistenceScope {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            PersistenceScope::Durable
        } else {
            PersistenceScope::Session
        }
    }

    pub fn tier(self) -> Option<Tier> {
        match self {
            PersistenceScope::None => None,
            PersistenceScope::Session => Some(Tier::Session),
            PersistenceScope::Durable => Some(Tier::Durable),
        }
    }
}

impl From<Tier> for PersistenceScope {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Session => PersistenceScope::Session,
            Tier::Durable => PersistenceScope::Durable,
        }
    }
}

/// Authenticated identity for the current process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    pub role: Role,
    pub display_name: String,
    pub persistence_scope: PersistenceScope,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            role: Role::Standard,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            persistence_scope: PersistenceScope::None,
        }
    }

    pub fn authenticated(display_name: &str, role: Role, scope: PersistenceScope) -> Self {
        let display_name = if display_name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            display_name.to_string()
        };
        Self {
            authenticated: true,
            role,
            display_name,
            persistence_scope: scope,
        }
    }

    /// Rebuild a session from a persisted record, if it says logged in
    pub fn from_restored(restored: &RestoredSession) -> Option<Self> {
        let record = &restored.record;
        record.logged_in.then(|| {
            Self::authenticated(
                &record.user,
                Role::from_elevated(record.admin),
                restored.tier.into(),
            )
        })
    }

    pub fn to_record(&self) -> PersistedSession {
        PersistedSession {
            logged_in: self.authenticated,
            admin: self.role.is_elevated(),
            user: self.display_name.clone(),
        }
    }
}

/// Session machine state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Persisted state not yet read; the UI shows neither form nor chat
    #[default]
    Initializing,

    /// Credential form is shown, with the last failure if any
    Unauthenticated { error: Option<String> },

    /// Credential exchange in flight
    Authenticating {
        mode: AuthMode,
        username: String,
        remember: bool,
    },

    Authenticated { session: Session },
}

impl SessionState {
    pub fn is_initializing(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    /// True while a credential request is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Authenticating { .. })
    }

    /// The current session, anonymous unless authenticated
    pub fn session(&self) -> Session {
        match self {
            SessionState::Authenticated { session } => session.clone(),
            _ => Session::anonymous(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SessionState::Unauthenticated { error } => error.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Turn identifier; lexicographic order is creation order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Time-ordered id (UUIDv7, monotonic within the process)
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity and time assigned to a turn when it is appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub id: TurnId,
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn now() -> Self {
        Self {
            id: TurnId::generate(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub speaker: Speaker,
    pub text: String,
    /// Assistant turns only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(stamp: Stamp, text: impl Into<String>) -> Self {
        Self {
            id: stamp.id,
            speaker: Speaker::User,
            text: text.into(),
            citations: None,
            created_at: stamp.at,
        }
    }

    pub fn assistant(stamp: Stamp, text: impl Into<String>, citations: Option<Vec<String>>) -> Self {
        Self {
            id: stamp.id,
            speaker: Speaker::Assistant,
            text: text.into(),
            citations,
            created_at: stamp.at,
        }
    }

    pub fn citations(&self) -> &[String] {
        self.citations.as_deref().unwrap_or_default()
    }
}

/// Append-only ordered list of turns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub(super) fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

/// Outbound message exchange status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    /// One request in flight carrying `message`
    Pending { message: String },
}

/// Conversation machine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub(super) transcript: Transcript,
    pub(super) exchange: ExchangeState,
}

impl Conversation {
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn turns(&self) -> &[Turn] {
        self.transcript.turns()
    }

    pub fn exchange(&self) -> &ExchangeState {
        &self.exchange
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.exchange, ExchangeState::Pending { .. })
    }

    /// Whether the submit control is enabled for `input`
    pub fn can_submit(&self, input: &str) -> bool {
        !self.is_pending() && !input.trim().is_empty()
    }
}
