//! Pure state transition functions
//!
//! Given the same state and event these always produce the same new state and
//! effects, with no I/O. Rejected events leave the caller's state untouched.

use super::effect::{ConvEffect, SessionEffect, ViewEvent};
use super::event::{ConvEvent, SessionEvent};
use super::state::{
    Conversation, ExchangeState, PersistenceScope, Role, Session, SessionState, Stamp, Transcript,
    Turn,
};
use crate::gateway::{ChatReply, GatewayError};
use crate::messages::{self, Surface, ValidationError, GREETING, NO_ANSWER_FALLBACK};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult<S, E> {
    pub new_state: S,
    pub effects: Vec<E>,
}

impl<S, E> TransitionResult<S, E> {
    pub fn new(state: S) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: E) -> Self {
        self.effects.push(effect);
        self
    }
}

pub type SessionTransition = TransitionResult<SessionState, SessionEffect>;
pub type ConvTransition = TransitionResult<Conversation, ConvEffect>;

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Session is still being restored")]
    StillInitializing,
    #[error("A credential request is already in flight")]
    AuthInFlight,
    #[error("Already signed in")]
    AlreadyAuthenticated,
    #[error("Input is blank")]
    BlankInput,
    #[error("A message exchange is already pending")]
    RequestPending,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

// ============================================================================
// Session machine
// ============================================================================

/// Session transition function
pub fn session_transition(
    state: &SessionState,
    event: SessionEvent,
) -> Result<SessionTransition, TransitionError> {
    match (state, event) {
        // Restore
        (SessionState::Initializing, SessionEvent::Restored { record }) => {
            let restored = record.as_ref().and_then(Session::from_restored);
            Ok(TransitionResult::new(match restored {
                Some(session) => SessionState::Authenticated { session },
                None => SessionState::Unauthenticated { error: None },
            }))
        }

        (_, SessionEvent::Restored { .. }) => Err(TransitionError::InvalidTransition(
            "session already restored".to_string(),
        )),

        // Credential submission
        (
            SessionState::Unauthenticated { .. },
            SessionEvent::AuthRequested {
                mode,
                credentials,
                remember,
            },
        ) => match messages::validate_credentials(&credentials) {
            Err(e) => Ok(TransitionResult::new(validation_failed(e))),
            Ok(()) => Ok(TransitionResult::new(SessionState::Authenticating {
                mode,
                username: credentials.username.clone(),
                remember,
            })
            .with_effect(SessionEffect::RequestCredentials { mode, credentials })),
        },

        (SessionState::Initializing, SessionEvent::AuthRequested { .. }) => {
            Err(TransitionError::StillInitializing)
        }

        (SessionState::Authenticating { .. }, SessionEvent::AuthRequested { .. }) => {
            Err(TransitionError::AuthInFlight)
        }

        (SessionState::Authenticated { .. }, SessionEvent::AuthRequested { .. }) => {
            Err(TransitionError::AlreadyAuthenticated)
        }

        // Credential outcome
        (
            SessionState::Authenticating {
                username, remember, ..
            },
            SessionEvent::AuthSucceeded { is_elevated },
        ) => {
            let scope = PersistenceScope::from_remember(*remember);
            let session = Session::authenticated(username, Role::from_elevated(is_elevated), scope);
            let mut result = TransitionResult::new(SessionState::Authenticated {
                session: session.clone(),
            });
            if let Some(tier) = scope.tier() {
                result = result.with_effect(SessionEffect::PersistSession {
                    tier,
                    record: session.to_record(),
                });
            }
            Ok(result)
        }

        (SessionState::Authenticating { .. }, SessionEvent::AuthFailed { message }) => {
            Ok(TransitionResult::new(SessionState::Unauthenticated {
                error: Some(message),
            }))
        }

        (_, SessionEvent::AuthSucceeded { .. } | SessionEvent::AuthFailed { .. }) => Err(
            TransitionError::InvalidTransition("no credential request in flight".to_string()),
        ),

        // Form housekeeping
        (SessionState::Unauthenticated { .. }, SessionEvent::ErrorDismissed) => Ok(
            TransitionResult::new(SessionState::Unauthenticated { error: None }),
        ),

        (_, SessionEvent::ErrorDismissed) => Ok(TransitionResult::new(state.clone())),

        // Logout; the request already issued cannot be abandoned
        (SessionState::Authenticating { .. }, SessionEvent::LogoutRequested) => {
            Err(TransitionError::AuthInFlight)
        }

        (_, SessionEvent::LogoutRequested) => Ok(TransitionResult::new(
            SessionState::Unauthenticated { error: None },
        )
        .with_effect(SessionEffect::ClearPersistedSession)),
    }
}

fn validation_failed(error: ValidationError) -> SessionState {
    SessionState::Unauthenticated {
        error: Some(error.to_string()),
    }
}

// ============================================================================
// Conversation machine
// ============================================================================

/// Fresh conversation holding only the greeting turn
pub fn initialize_conversation(stamp: Stamp) -> Conversation {
    let mut transcript = Transcript::default();
    transcript.append(Turn::assistant(stamp, GREETING, None));
    Conversation {
        transcript,
        exchange: ExchangeState::Idle,
    }
}

/// Conversation transition function.
///
/// Every accepted event appends exactly one turn, identified by `stamp`.
pub fn conversation_transition(
    state: &Conversation,
    event: ConvEvent,
    stamp: Stamp,
) -> Result<ConvTransition, TransitionError> {
    match (&state.exchange, event) {
        (ExchangeState::Pending { .. }, ConvEvent::UserSubmit { .. }) => {
            Err(TransitionError::RequestPending)
        }

        (ExchangeState::Idle, ConvEvent::UserSubmit { text }) => {
            let message = text.trim();
            if message.is_empty() {
                return Err(TransitionError::BlankInput);
            }
            let turn = Turn::user(stamp, message);
            let next = append(state, turn.clone(), ExchangeState::Pending {
                message: message.to_string(),
            });
            Ok(TransitionResult::new(next)
                .with_effect(ConvEffect::turn_appended(turn))
                .with_effect(ConvEffect::Notify(ViewEvent::InputCleared))
                .with_effect(ConvEffect::pending_changed(true))
                .with_effect(ConvEffect::RequestAnswer {
                    message: message.to_string(),
                }))
        }

        (ExchangeState::Pending { .. }, ConvEvent::AnswerReceived { reply }) => {
            let turn = answer_turn(stamp, reply);
            Ok(settle(state, turn))
        }

        (ExchangeState::Pending { .. }, ConvEvent::ExchangeFailed { kind, message }) => {
            let error = GatewayError::new(kind, message);
            let text = messages::user_message(Surface::Transcript, &error);
            Ok(settle(state, Turn::assistant(stamp, text, None)))
        }

        (ExchangeState::Idle, ConvEvent::AnswerReceived { .. } | ConvEvent::ExchangeFailed { .. }) => {
            Err(TransitionError::InvalidTransition(
                "no message exchange pending".to_string(),
            ))
        }
    }
}

/// Build the assistant turn for a successful exchange.
///
/// At most one source is shown, whatever the server returns.
fn answer_turn(stamp: Stamp, reply: ChatReply) -> Turn {
    let text = reply
        .answer
        .filter(|answer| !answer.is_empty())
        .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());
    let citations = reply
        .sources
        .unwrap_or_default()
        .into_iter()
        .take(1)
        .collect();
    Turn::assistant(stamp, text, Some(citations))
}

/// Append the assistant turn and clear the pending flag
fn settle(state: &Conversation, turn: Turn) -> ConvTransition {
    let next = append(state, turn.clone(), ExchangeState::Idle);
    TransitionResult::new(next)
        .with_effect(ConvEffect::turn_appended(turn))
        .with_effect(ConvEffect::pending_changed(false))
}

fn append(state: &Conversation, turn: Turn, exchange: ExchangeState) -> Conversation {
    let mut transcript = state.transcript.clone();
    transcript.append(turn);
    Conversation {
        transcript,
        exchange,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AuthMode, Credentials, GatewayErrorKind};
    use crate::messages::{AUTH_FAILED, EXCHANGE_FAILED};
    use crate::storage::{PersistedSession, RestoredSession, Tier};

    fn unauthenticated() -> SessionState {
        SessionState::Unauthenticated { error: None }
    }

    fn auth_requested(username: &str, password: &str, remember: bool) -> SessionEvent {
        SessionEvent::AuthRequested {
            mode: AuthMode::Login,
            credentials: Credentials::new(username, password),
            remember,
        }
    }

    fn authenticating(remember: bool) -> SessionState {
        SessionState::Authenticating {
            mode: AuthMode::Login,
            username: "eda".to_string(),
            remember,
        }
    }

    #[test]
    fn test_restore_without_record() {
        let result =
            session_transition(&SessionState::Initializing, SessionEvent::Restored { record: None })
                .unwrap();
        assert_eq!(result.new_state, unauthenticated());
        assert!(result.effects.is_empty());
    }

    #[test]
    fn test_restore_with_record() {
        let record = RestoredSession {
            tier: Tier::Durable,
            record: PersistedSession {
                logged_in: true,
                admin: true,
                user: "eczaci".to_string(),
            },
        };
        let result = session_transition(
            &SessionState::Initializing,
            SessionEvent::Restored {
                record: Some(record),
            },
        )
        .unwrap();

        let session = result.new_state.session();
        assert!(session.authenticated);
        assert_eq!(session.role, Role::Elevated);
        assert_eq!(session.display_name, "eczaci");
        assert_eq!(session.persistence_scope, PersistenceScope::Durable);
    }

    #[test]
    fn test_restore_only_once() {
        let err = session_transition(&unauthenticated(), SessionEvent::Restored { record: None })
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn test_blank_credentials_issue_no_request() {
        for (user, pass) in [("", "secret1"), ("eda", ""), ("   ", "   "), ("eda", "12345")] {
            let result = session_transition(&unauthenticated(), auth_requested(user, pass, true))
                .unwrap();
            assert!(result.effects.is_empty(), "{user:?}/{pass:?} issued a request");
            assert!(result.new_state.error().is_some());
            assert!(!result.new_state.session().authenticated);
        }
    }

    #[test]
    fn test_valid_credentials_request_exchange() {
        let result =
            session_transition(&unauthenticated(), auth_requested("eda", "secret1", false)).unwrap();
        assert_eq!(result.new_state, authenticating(false));
        assert_eq!(
            result.effects,
            vec![SessionEffect::RequestCredentials {
                mode: AuthMode::Login,
                credentials: Credentials::new("eda", "secret1"),
            }]
        );
    }

    #[test]
    fn test_reentry_rejected_while_authenticating() {
        let err = session_transition(&authenticating(false), auth_requested("eda", "secret1", false))
            .unwrap_err();
        assert_eq!(err, TransitionError::AuthInFlight);
    }

    #[test]
    fn test_auth_success_persists_to_scope_tier() {
        for (remember, tier) in [(true, Tier::Durable), (false, Tier::Session)] {
            let result = session_transition(
                &authenticating(remember),
                SessionEvent::AuthSucceeded { is_elevated: false },
            )
            .unwrap();

            let session = result.new_state.session();
            assert!(session.authenticated);
            assert_eq!(session.role, Role::Standard);
            assert_eq!(session.display_name, "eda");
            assert_eq!(
                result.effects,
                vec![SessionEffect::PersistSession {
                    tier,
                    record: PersistedSession {
                        logged_in: true,
                        admin: false,
                        user: "eda".to_string(),
                    },
                }]
            );
        }
    }

    #[test]
    fn test_auth_failure_keeps_session_anonymous() {
        let result = session_transition(
            &authenticating(true),
            SessionEvent::AuthFailed {
                message: AUTH_FAILED.to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state.error(), Some(AUTH_FAILED));
        assert!(result.effects.is_empty());
    }

    #[test]
    fn test_error_dismissed() {
        let state = SessionState::Unauthenticated {
            error: Some("x".to_string()),
        };
        let result = session_transition(&state, SessionEvent::ErrorDismissed).unwrap();
        assert_eq!(result.new_state, unauthenticated());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let authenticated = SessionState::Authenticated {
            session: Session::authenticated("eda", Role::Standard, PersistenceScope::Session),
        };
        for state in [authenticated, unauthenticated(), SessionState::Initializing] {
            let result = session_transition(&state, SessionEvent::LogoutRequested).unwrap();
            assert_eq!(result.new_state, unauthenticated());
            assert_eq!(result.effects, vec![SessionEffect::ClearPersistedSession]);
        }
    }

    #[test]
    fn test_logout_waits_for_auth_request() {
        let err =
            session_transition(&authenticating(false), SessionEvent::LogoutRequested).unwrap_err();
        assert_eq!(err, TransitionError::AuthInFlight);
    }

    fn submit(text: &str) -> ConvEvent {
        ConvEvent::UserSubmit {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_initialize_has_greeting_only() {
        let conv = initialize_conversation(Stamp::now());
        assert_eq!(conv.turns().len(), 1);
        assert_eq!(conv.turns()[0].text, GREETING);
        assert!(!conv.is_pending());
    }

    #[test]
    fn test_submit_trims_and_requests() {
        let conv = initialize_conversation(Stamp::now());
        let result = conversation_transition(&conv, submit("  Parol ne işe yarar?  "), Stamp::now())
            .unwrap();

        assert!(result.new_state.is_pending());
        assert_eq!(result.new_state.turns()[1].text, "Parol ne işe yarar?");
        assert!(result.effects.contains(&ConvEffect::RequestAnswer {
            message: "Parol ne işe yarar?".to_string()
        }));
        assert!(result
            .effects
            .contains(&ConvEffect::Notify(ViewEvent::InputCleared)));
    }

    #[test]
    fn test_blank_submit_rejected() {
        let conv = initialize_conversation(Stamp::now());
        let err = conversation_transition(&conv, submit(" \t\n"), Stamp::now()).unwrap_err();
        assert_eq!(err, TransitionError::BlankInput);
    }

    #[test]
    fn test_submit_while_pending_rejected() {
        let conv = initialize_conversation(Stamp::now());
        let pending = conversation_transition(&conv, submit("a"), Stamp::now())
            .unwrap()
            .new_state;
        let err = conversation_transition(&pending, submit("b"), Stamp::now()).unwrap_err();
        assert_eq!(err, TransitionError::RequestPending);
    }

    #[test]
    fn test_answer_truncates_sources_to_first() {
        let conv = initialize_conversation(Stamp::now());
        let pending = conversation_transition(&conv, submit("a"), Stamp::now())
            .unwrap()
            .new_state;
        let reply = ChatReply {
            answer: Some("cevap".to_string()),
            sources: Some(vec!["A".into(), "B".into(), "C".into()]),
        };
        let result =
            conversation_transition(&pending, ConvEvent::AnswerReceived { reply }, Stamp::now())
                .unwrap();

        let turn = result.new_state.transcript().last().unwrap();
        assert_eq!(turn.citations, Some(vec!["A".to_string()]));
        assert!(!result.new_state.is_pending());
    }

    #[test]
    fn test_missing_or_empty_answer_uses_fallback() {
        let conv = initialize_conversation(Stamp::now());
        let pending = conversation_transition(&conv, submit("a"), Stamp::now())
            .unwrap()
            .new_state;

        for answer in [None, Some(String::new())] {
            let reply = ChatReply {
                answer,
                sources: None,
            };
            let result =
                conversation_transition(&pending, ConvEvent::AnswerReceived { reply }, Stamp::now())
                    .unwrap();
            let turn = result.new_state.transcript().last().unwrap();
            assert_eq!(turn.text, NO_ANSWER_FALLBACK);
            assert_eq!(turn.citations, Some(vec![]));
        }
    }

    #[test]
    fn test_failure_appends_apology() {
        let conv = initialize_conversation(Stamp::now());
        let pending = conversation_transition(&conv, submit("a"), Stamp::now())
            .unwrap()
            .new_state;
        let result = conversation_transition(
            &pending,
            ConvEvent::ExchangeFailed {
                kind: GatewayErrorKind::Timeout,
                message: "timed out".to_string(),
            },
            Stamp::now(),
        )
        .unwrap();

        let turn = result.new_state.transcript().last().unwrap();
        assert_eq!(turn.text, EXCHANGE_FAILED);
        assert_eq!(turn.citations, None);
        assert!(!result.new_state.is_pending());
        assert_eq!(result.new_state.turns().len(), 3);
    }

    #[test]
    fn test_outcome_without_pending_rejected() {
        let conv = initialize_conversation(Stamp::now());
        let err = conversation_transition(
            &conv,
            ConvEvent::AnswerReceived {
                reply: ChatReply::default(),
            },
            Stamp::now(),
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }
}
