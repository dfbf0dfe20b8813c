//! Session manager: executes session effects against storage and gateway

use crate::gateway::{AuthMode, CredentialGateway, Credentials};
use crate::messages;
use crate::state_machine::{
    session_transition, Session, SessionEffect, SessionEvent, SessionState, TransitionError,
};
use crate::storage::{KeyValueStore, SessionPersistence};
use std::sync::Arc;

/// Owns the session state and its persistence
pub struct SessionManager<G, K>
where
    G: CredentialGateway,
    K: KeyValueStore,
{
    state: SessionState,
    persistence: SessionPersistence<K>,
    gateway: Arc<G>,
}

impl<G, K> SessionManager<G, K>
where
    G: CredentialGateway,
    K: KeyValueStore,
{
    pub fn new(gateway: Arc<G>, persistence: SessionPersistence<K>) -> Self {
        Self {
            state: SessionState::Initializing,
            persistence,
            gateway,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Session {
        self.state.session()
    }

    /// True until `restore` has completed
    pub fn is_initializing(&self) -> bool {
        self.state.is_initializing()
    }

    pub fn persistence(&self) -> &SessionPersistence<K> {
        &self.persistence
    }

    /// Read persisted state. Corrupt records restore as "no session".
    pub fn restore(&mut self) -> Result<&SessionState, TransitionError> {
        let record = self.persistence.load();
        tracing::info!(
            tier = ?record.as_ref().map(|r| r.tier),
            "Restoring session"
        );
        self.process_event(SessionEvent::Restored { record })?;
        Ok(&self.state)
    }

    /// Sign in or register.
    ///
    /// Validation and gateway failures end in `Unauthenticated` with an error
    /// message and are not returned as `Err`; only rejected events are.
    /// Dropping the returned future mid-request fails the attempt, so the
    /// manager never stays in `Authenticating`.
    pub async fn authenticate(
        &mut self,
        mode: AuthMode,
        credentials: Credentials,
        remember: bool,
    ) -> Result<&SessionState, TransitionError> {
        let effects = self.apply(SessionEvent::AuthRequested {
            mode,
            credentials,
            remember,
        })?;

        let mut outcome = None;
        for effect in effects {
            match effect {
                SessionEffect::RequestCredentials { mode, credentials } => {
                    outcome = Some(self.exchange_credentials(mode, &credentials).await);
                }
                other => self.execute_storage_effect(&other),
            }
        }

        if let Some(event) = outcome {
            self.process_event(event)?;
        }
        Ok(&self.state)
    }

    /// Clear both tiers and reset to anonymous
    pub fn logout(&mut self) -> Result<&SessionState, TransitionError> {
        self.process_event(SessionEvent::LogoutRequested)?;
        tracing::info!("Signed out");
        Ok(&self.state)
    }

    /// Drop the error line shown on the form
    pub fn dismiss_error(&mut self) {
        // Accepted in every state
        let _ = self.process_event(SessionEvent::ErrorDismissed);
    }

    fn apply(&mut self, event: SessionEvent) -> Result<Vec<SessionEffect>, TransitionError> {
        let result = session_transition(&self.state, event).map_err(|e| {
            tracing::debug!(error = %e, "Session event rejected");
            e
        })?;
        self.state = result.new_state;
        Ok(result.effects)
    }

    /// Apply an event whose effects never touch the gateway
    fn process_event(&mut self, event: SessionEvent) -> Result<(), TransitionError> {
        for effect in self.apply(event)? {
            self.execute_storage_effect(&effect);
        }
        Ok(())
    }

    async fn exchange_credentials(
        &mut self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> SessionEvent {
        let guard = AbandonGuard::new(&mut self.state);
        let outcome = self.gateway.exchange_credentials(mode, credentials).await;
        guard.disarm();

        match messages::classify_credential_outcome(&outcome) {
            Ok(is_elevated) => {
                tracing::info!(
                    user = %credentials.username,
                    elevated = is_elevated,
                    "Signed in"
                );
                SessionEvent::AuthSucceeded { is_elevated }
            }
            Err(message) => SessionEvent::AuthFailed { message },
        }
    }

    fn execute_storage_effect(&self, effect: &SessionEffect) {
        match effect {
            SessionEffect::PersistSession { tier, record } => {
                // The session stays valid for this process even if it cannot be saved
                if let Err(e) = self.persistence.save(*tier, record) {
                    tracing::warn!(?tier, error = %e, "Failed to persist session");
                }
            }
            SessionEffect::ClearPersistedSession => {
                if let Err(e) = self.persistence.clear() {
                    tracing::warn!(error = %e, "Failed to clear persisted session");
                }
            }
            SessionEffect::RequestCredentials { .. } => {
                tracing::error!("Credential request outside authenticate(), ignored");
            }
        }
    }
}

/// Fails an in-flight credential request whose future was dropped
struct AbandonGuard<'a> {
    state: &'a mut SessionState,
    armed: bool,
}

impl<'a> AbandonGuard<'a> {
    fn new(state: &'a mut SessionState) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Credential request abandoned before completion");
        let event = SessionEvent::AuthFailed {
            message: messages::AUTH_FAILED.to_string(),
        };
        match session_transition(&*self.state, event) {
            Ok(result) => *self.state = result.new_state,
            Err(e) => tracing::error!(error = %e, "Could not fail abandoned request"),
        }
    }
}
