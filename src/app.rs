//! Application core: ties the session to the lifetime of a conversation
//!
//! A conversation exists only while the session is authenticated. Signing in
//! starts one seeded with the greeting; signing out discards it.

use crate::gateway::{AuthMode, Credentials, RemoteGateway};
use crate::runtime::{ConversationHandle, ConversationRuntime, SessionManager};
use crate::state_machine::{Session, SessionState, TransitionError};
use crate::storage::{KeyValueStore, SessionPersistence};
use std::sync::Arc;

pub struct App<G, K>
where
    G: RemoteGateway + 'static,
    K: KeyValueStore,
{
    gateway: Arc<G>,
    session: SessionManager<G, K>,
    conversation: Option<ConversationHandle>,
}

impl<G, K> App<G, K>
where
    G: RemoteGateway + 'static,
    K: KeyValueStore,
{
    pub fn new(gateway: Arc<G>, persistence: SessionPersistence<K>) -> Self {
        Self {
            session: SessionManager::new(Arc::clone(&gateway), persistence),
            gateway,
            conversation: None,
        }
    }

    /// Restore the persisted session; a restored sign-in opens a conversation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn boot(&mut self) -> Result<&SessionState, TransitionError> {
        self.session.restore()?;
        self.sync_conversation();
        Ok(self.session.state())
    }

    pub async fn sign_in(
        &mut self,
        mode: AuthMode,
        credentials: Credentials,
        remember: bool,
    ) -> Result<&SessionState, TransitionError> {
        self.session.authenticate(mode, credentials, remember).await?;
        self.sync_conversation();
        Ok(self.session.state())
    }

    pub fn logout(&mut self) -> Result<&SessionState, TransitionError> {
        self.session.logout()?;
        self.sync_conversation();
        Ok(self.session.state())
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_error();
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn session(&self) -> Session {
        self.session.session()
    }

    /// The active conversation, present only while authenticated
    pub fn conversation(&self) -> Option<&ConversationHandle> {
        self.conversation.as_ref()
    }

    fn sync_conversation(&mut self) {
        match (self.session.state().is_authenticated(), &self.conversation) {
            (true, None) => {
                tracing::info!("Opening conversation");
                self.conversation = Some(ConversationRuntime::spawn(Arc::clone(&self.gateway)));
            }
            (false, Some(handle)) => {
                tracing::info!("Closing conversation");
                handle.close();
                self.conversation = None;
            }
            _ => {}
        }
    }
}

impl<G, K> Drop for App<G, K>
where
    G: RemoteGateway + 'static,
    K: KeyValueStore,
{
    fn drop(&mut self) {
        if let Some(handle) = self.conversation.take() {
            handle.close();
        }
    }
}
