//! Property-based tests for the state machines
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::gateway::{AuthMode, ChatReply, Credentials, GatewayErrorKind};
use crate::messages::{EXCHANGE_FAILED, NO_ANSWER_FALLBACK};
use crate::storage::{PersistedSession, RestoredSession, Tier};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

/// Stamps with strictly increasing ids, independent of the clock
struct StampSeq(u32);

impl StampSeq {
    fn next(&mut self) -> Stamp {
        self.0 += 1;
        Stamp {
            id: TurnId::new(format!("{:08}", self.0)),
            at: chrono::Utc::now(),
        }
    }
}

fn pending_conversation(seq: &mut StampSeq) -> Conversation {
    let conv = initialize_conversation(seq.next());
    conversation_transition(
        &conv,
        ConvEvent::UserSubmit {
            text: "Parol".to_string(),
        },
        seq.next(),
    )
    .unwrap()
    .new_state
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_blank() -> impl Strategy<Value = String> {
    "[ \t\r\n]{0,8}"
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![arb_blank(), "[a-zA-ZçğıöşüÇĞİÖŞÜ ?]{1,30}"]
}

fn arb_error_kind() -> impl Strategy<Value = GatewayErrorKind> {
    prop_oneof![
        Just(GatewayErrorKind::Network),
        Just(GatewayErrorKind::Timeout),
        Just(GatewayErrorKind::Rejected),
        Just(GatewayErrorKind::Server),
        Just(GatewayErrorKind::Decode),
        Just(GatewayErrorKind::Unknown),
    ]
}

fn arb_reply() -> impl Strategy<Value = ChatReply> {
    (
        proptest::option::of("[a-zA-Z .]{0,40}"),
        proptest::option::of(proptest::collection::vec("[a-z0-9_]{1,12}", 0..6)),
    )
        .prop_map(|(answer, sources)| ChatReply { answer, sources })
}

fn arb_conv_event() -> impl Strategy<Value = ConvEvent> {
    prop_oneof![
        arb_text().prop_map(|text| ConvEvent::UserSubmit { text }),
        arb_reply().prop_map(|reply| ConvEvent::AnswerReceived { reply }),
        (arb_error_kind(), "[a-z ]{0,20}")
            .prop_map(|(kind, message)| ConvEvent::ExchangeFailed { kind, message }),
    ]
}

fn arb_credentials() -> impl Strategy<Value = Credentials> {
    ("[a-z ]{0,10}", "[a-z0-9 ]{0,10}")
        .prop_map(|(username, password)| Credentials::new(username, password))
}

fn arb_auth_mode() -> impl Strategy<Value = AuthMode> {
    prop_oneof![Just(AuthMode::Login), Just(AuthMode::Register)]
}

fn arb_session_event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        (arb_auth_mode(), arb_credentials(), any::<bool>()).prop_map(
            |(mode, credentials, remember)| SessionEvent::AuthRequested {
                mode,
                credentials,
                remember,
            }
        ),
        any::<bool>().prop_map(|is_elevated| SessionEvent::AuthSucceeded { is_elevated }),
        "[a-z ]{1,20}".prop_map(|message| SessionEvent::AuthFailed { message }),
        Just(SessionEvent::ErrorDismissed),
        Just(SessionEvent::LogoutRequested),
    ]
}

fn arb_restored() -> impl Strategy<Value = Option<RestoredSession>> {
    proptest::option::of(
        (
            prop_oneof![Just(Tier::Durable), Just(Tier::Session)],
            any::<bool>(),
            any::<bool>(),
            "[a-z]{0,8}",
        )
            .prop_map(|(tier, logged_in, admin, user)| RestoredSession {
                tier,
                record: PersistedSession {
                    logged_in,
                    admin,
                    user,
                },
            }),
    )
}

// ============================================================================
// Conversation Properties
// ============================================================================

proptest! {
    /// Blank input never appends a turn and never sets pending
    #[test]
    fn prop_blank_submit_is_noop(text in arb_blank()) {
        let mut seq = StampSeq(0);
        let conv = initialize_conversation(seq.next());
        let result = conversation_transition(&conv, ConvEvent::UserSubmit { text }, seq.next());
        prop_assert_eq!(result.unwrap_err(), TransitionError::BlankInput);
    }

    /// Submitting while pending is rejected, whatever the text
    #[test]
    fn prop_submit_while_pending_rejected(text in arb_text()) {
        let mut seq = StampSeq(0);
        let pending = pending_conversation(&mut seq);
        let result = conversation_transition(&pending, ConvEvent::UserSubmit { text }, seq.next());
        prop_assert!(result.is_err());
    }

    /// Citations are the first source only, and text is never empty
    #[test]
    fn prop_answer_turn_shape(reply in arb_reply()) {
        let mut seq = StampSeq(0);
        let pending = pending_conversation(&mut seq);
        let expected_citation: Vec<String> =
            reply.sources.clone().unwrap_or_default().into_iter().take(1).collect();
        let expected_text = reply
            .answer
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());

        let result = conversation_transition(
            &pending,
            ConvEvent::AnswerReceived { reply },
            seq.next(),
        ).unwrap();

        let turn = result.new_state.transcript().last().unwrap();
        prop_assert_eq!(turn.speaker, Speaker::Assistant);
        prop_assert_eq!(turn.citations.clone(), Some(expected_citation));
        prop_assert_eq!(&turn.text, &expected_text);
        prop_assert!(!result.new_state.is_pending());
    }

    /// Any failure yields the apology turn without citations
    #[test]
    fn prop_failure_turn_shape(kind in arb_error_kind(), message in "[a-z ]{0,20}") {
        let mut seq = StampSeq(0);
        let pending = pending_conversation(&mut seq);
        let result = conversation_transition(
            &pending,
            ConvEvent::ExchangeFailed { kind, message },
            seq.next(),
        ).unwrap();

        let turn = result.new_state.transcript().last().unwrap();
        prop_assert_eq!(turn.text.as_str(), EXCHANGE_FAILED);
        prop_assert_eq!(turn.citations.clone(), None);
        prop_assert!(!result.new_state.is_pending());
    }

    /// Over any event sequence: append-only, ordered ids, causal order,
    /// one request per accepted submit
    #[test]
    fn prop_transcript_append_only(events in proptest::collection::vec(arb_conv_event(), 0..40)) {
        let mut seq = StampSeq(0);
        let mut conv = initialize_conversation(seq.next());
        let mut requests = 0usize;

        for event in events {
            let before = conv.clone();
            match conversation_transition(&conv, event, seq.next()) {
                Ok(result) => {
                    let after = result.new_state;
                    prop_assert_eq!(after.turns().len(), before.turns().len() + 1);
                    prop_assert_eq!(&after.turns()[..before.turns().len()], before.turns());

                    let appended = after.transcript().last().unwrap();
                    if appended.speaker == Speaker::User {
                        prop_assert!(after.is_pending());
                    } else {
                        prop_assert!(!after.is_pending());
                    }

                    requests += result
                        .effects
                        .iter()
                        .filter(|e| matches!(e, ConvEffect::RequestAnswer { .. }))
                        .count();
                    conv = after;
                }
                Err(_) => {
                    // Rejected events are no-ops for the caller
                    prop_assert_eq!(&conv, &before);
                }
            }
        }

        let turns = conv.turns();
        prop_assert!(turns.windows(2).all(|w| w[0].id < w[1].id));

        // Every user turn except a trailing pending one is answered right after
        let user_turns = turns.iter().filter(|t| t.speaker == Speaker::User).count();
        prop_assert_eq!(user_turns, requests);
        for (i, turn) in turns.iter().enumerate() {
            if turn.speaker == Speaker::User && i + 1 < turns.len() {
                prop_assert_eq!(turns[i + 1].speaker, Speaker::Assistant);
            }
        }
    }
}

// ============================================================================
// Session Properties
// ============================================================================

proptest! {
    /// Invalid credentials never produce a gateway request
    #[test]
    fn prop_invalid_credentials_issue_no_request(
        mode in arb_auth_mode(),
        credentials in arb_credentials(),
        remember in any::<bool>(),
    ) {
        let valid = crate::messages::validate_credentials(&credentials).is_ok();
        let state = SessionState::Unauthenticated { error: None };
        let result = session_transition(
            &state,
            SessionEvent::AuthRequested { mode, credentials, remember },
        ).unwrap();

        if valid {
            prop_assert!(result.new_state.is_busy());
            prop_assert_eq!(result.effects.len(), 1);
        } else {
            prop_assert!(result.effects.is_empty());
            prop_assert!(!result.new_state.session().authenticated);
            prop_assert!(result.new_state.error().is_some());
        }
    }

    /// Authenticated is only reached from Authenticating via success (or restore),
    /// and every success persists exactly once
    #[test]
    fn prop_session_transitions_are_guarded(
        restored in arb_restored(),
        events in proptest::collection::vec(arb_session_event(), 0..30),
    ) {
        let mut state = session_transition(
            &SessionState::Initializing,
            SessionEvent::Restored { record: restored },
        ).unwrap().new_state;
        prop_assert!(!state.is_initializing());

        for event in events {
            let was_authenticating = state.is_busy();
            let was_authenticated = state.is_authenticated();
            let is_success = matches!(event, SessionEvent::AuthSucceeded { .. });
            let is_logout = matches!(event, SessionEvent::LogoutRequested);

            match session_transition(&state, event) {
                Ok(result) => {
                    if result.new_state.is_authenticated() && !was_authenticated {
                        prop_assert!(was_authenticating && is_success);
                        let persists = result
                            .effects
                            .iter()
                            .filter(|e| matches!(e, SessionEffect::PersistSession { .. }))
                            .count();
                        prop_assert_eq!(persists, 1);
                    }
                    if was_authenticated && !result.new_state.is_authenticated() {
                        prop_assert!(is_logout);
                        prop_assert!(result.effects.contains(&SessionEffect::ClearPersistedSession));
                    }
                    state = result.new_state;
                }
                Err(_) => {}
            }
        }
    }
}
