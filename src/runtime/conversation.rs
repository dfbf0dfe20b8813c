//! Conversation runtime
//!
//! Runs the conversation machine as a task that consumes events one at a time.
//! A message exchange is the only step that suspends: it runs in its own task
//! and posts its outcome back as an event.

use crate::gateway::{ChatGateway, ChatRequest, GatewayErrorKind};
use crate::state_machine::transition::ConvTransition;
use crate::state_machine::{
    conversation_transition, initialize_conversation, ConvEffect, ConvEvent, Conversation, Stamp,
    TransitionError, ViewEvent,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const VIEW_CHANNEL_CAPACITY: usize = 128;

type TransitionFn = fn(&Conversation, ConvEvent, Stamp) -> Result<ConvTransition, TransitionError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Conversation has ended")]
pub struct ConversationClosed;

/// Handle the rendering layer uses to drive and observe a conversation
#[derive(Clone)]
pub struct ConversationHandle {
    event_tx: mpsc::Sender<ConvEvent>,
    snapshot_rx: watch::Receiver<Conversation>,
    view_tx: broadcast::Sender<ViewEvent>,
    shutdown: CancellationToken,
}

impl ConversationHandle {
    /// Queue a user submission.
    ///
    /// Blank text or a pending exchange turn this into a no-op inside the
    /// runtime; check `can_submit` to disable the control up front.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), ConversationClosed> {
        self.event_tx
            .send(ConvEvent::UserSubmit { text: text.into() })
            .await
            .map_err(|_| ConversationClosed)
    }

    /// Current state as last published by the runtime
    pub fn snapshot(&self) -> Conversation {
        self.snapshot_rx.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.snapshot_rx.borrow().is_pending()
    }

    pub fn can_submit(&self, input: &str) -> bool {
        self.snapshot_rx.borrow().can_submit(input)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.view_tx.subscribe()
    }

    /// Wait for the first published state matching `condition`
    pub async fn wait_until<F>(&self, condition: F) -> Result<Conversation, ConversationClosed>
    where
        F: FnMut(&Conversation) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let conv = rx.wait_for(condition).await.map_err(|_| ConversationClosed)?;
        Ok(conv.clone())
    }

    /// Wait until no exchange is pending
    pub async fn wait_idle(&self) -> Result<Conversation, ConversationClosed> {
        self.wait_until(|conv| !conv.is_pending()).await
    }

    /// Stop the runtime; the transcript is discarded
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Conversation runtime generic over the chat gateway
pub struct ConversationRuntime<G: ChatGateway + 'static> {
    state: Conversation,
    gateway: Arc<G>,
    event_rx: mpsc::Receiver<ConvEvent>,
    event_tx: mpsc::Sender<ConvEvent>,
    snapshot_tx: watch::Sender<Conversation>,
    view_tx: broadcast::Sender<ViewEvent>,
    shutdown: CancellationToken,
    transition: TransitionFn,
}

impl<G: ChatGateway + 'static> ConversationRuntime<G> {
    /// Start a conversation seeded with the greeting and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(gateway: Arc<G>) -> ConversationHandle {
        Self::spawn_with(gateway, conversation_transition)
    }

    fn spawn_with(gateway: Arc<G>, transition: TransitionFn) -> ConversationHandle {
        let state = initialize_conversation(Stamp::now());
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.clone());
        let (view_tx, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let handle = ConversationHandle {
            event_tx: event_tx.clone(),
            snapshot_rx,
            view_tx: view_tx.clone(),
            shutdown: shutdown.clone(),
        };

        let runtime = Self {
            state,
            gateway,
            event_rx,
            event_tx,
            snapshot_tx,
            view_tx,
            shutdown,
            transition,
        };
        tokio::spawn(runtime.run());

        handle
    }

    async fn run(mut self) {
        tracing::info!("Starting conversation runtime");
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event),
                else => break,
            }
        }

        tracing::info!(turns = self.state.turns().len(), "Conversation runtime stopped");
    }

    fn process_event(&mut self, event: ConvEvent) {
        let transition = self.transition;
        let state = &self.state;
        let outcome = catch_unwind(AssertUnwindSafe(|| transition(state, event, Stamp::now())));

        let result = match outcome {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                // Blank input and submissions while pending are no-ops
                tracing::debug!(error = %e, "Conversation event ignored");
                return;
            }
            Err(_) => {
                tracing::error!("Conversation transition panicked");
                match self.recover_pending() {
                    Some(r) => r,
                    None => return,
                }
            }
        };

        self.state = result.new_state;
        self.snapshot_tx.send_replace(self.state.clone());

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    /// Settle a pending exchange whose outcome could not be applied
    fn recover_pending(&self) -> Option<ConvTransition> {
        if !self.state.is_pending() {
            return None;
        }
        let event = ConvEvent::ExchangeFailed {
            kind: GatewayErrorKind::Unknown,
            message: "Failed to apply exchange outcome".to_string(),
        };
        conversation_transition(&self.state, event, Stamp::now()).ok()
    }

    fn execute_effect(&self, effect: ConvEffect) {
        match effect {
            ConvEffect::RequestAnswer { message } => self.spawn_exchange(message),
            ConvEffect::Notify(view_event) => {
                // No subscribers is fine
                let _ = self.view_tx.send(view_event);
            }
        }
    }

    /// Run one exchange and post exactly one outcome event.
    ///
    /// The gateway call gets its own task so that a panic there still ends in
    /// `ExchangeFailed` and clears the pending flag.
    fn spawn_exchange(&self, message: String) {
        let gateway = Arc::clone(&self.gateway);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let request = ChatRequest { message };
            let exchange = tokio::spawn(async move { gateway.ask(&request).await });

            let event = match exchange.await {
                Ok(Ok(reply)) => ConvEvent::AnswerReceived { reply },
                Ok(Err(e)) => ConvEvent::ExchangeFailed {
                    kind: e.kind,
                    message: e.message,
                },
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Message exchange task failed");
                    ConvEvent::ExchangeFailed {
                        kind: GatewayErrorKind::Unknown,
                        message: format!("Exchange task failed: {join_error}"),
                    }
                }
            };

            if event_tx.send(event).await.is_err() {
                tracing::debug!("Conversation closed before exchange completed");
            }
        });
    }
}
