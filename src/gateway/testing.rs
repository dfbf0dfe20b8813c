//! Mock gateway for testing
//!
//! Replies are queued per exchange and every request is recorded. The chat
//! exchange can be held open with a gate, or made to panic, to exercise the
//! pending-request paths.

use super::types::{AuthMode, AuthReply, ChatReply, ChatRequest, Credentials};
use super::{ChatGateway, CredentialGateway, GatewayError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

#[derive(Default)]
pub struct MockGateway {
    auth_replies: Mutex<VecDeque<Result<AuthReply, GatewayError>>>,
    chat_replies: Mutex<VecDeque<Result<ChatReply, GatewayError>>>,
    /// Record of credential requests
    pub auth_requests: Mutex<Vec<(AuthMode, Credentials)>>,
    /// Record of chat requests
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    /// When set, chat calls wait for a permit before answering
    gate: Option<Arc<Semaphore>>,
    panic_on_chat: AtomicBool,
    /// Notified when a chat request arrives
    pub chat_started: Arc<Notify>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold chat answers until `release_chat` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn queue_auth(&self, reply: Result<AuthReply, GatewayError>) {
        self.auth_replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_chat(&self, reply: Result<ChatReply, GatewayError>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    /// Let one held chat call answer
    pub fn release_chat(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Make the next chat calls panic instead of answering
    pub fn panic_on_chat(&self) {
        self.panic_on_chat.store(true, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_requests.lock().unwrap().len()
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }

    pub fn recorded_chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialGateway for MockGateway {
    async fn exchange_credentials(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, GatewayError> {
        self.auth_requests
            .lock()
            .unwrap()
            .push((mode, credentials.clone()));
        self.auth_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::network("No mock auth reply queued")))
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        self.chat_started.notify_waiters();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        assert!(
            !self.panic_on_chat.load(Ordering::SeqCst),
            "mock chat handler failure"
        );

        self.chat_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::network("No mock chat reply queued")))
    }
}
