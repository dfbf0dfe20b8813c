//! Remote gateway abstraction
//!
//! The answering service exposes a credential exchange and a message
//! exchange. Both are opaque request/response calls with a typed outcome.

mod error;
mod http;
#[cfg(test)]
pub mod testing;
mod types;

pub use error::{GatewayError, GatewayErrorKind};
pub use http::HttpGateway;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Credential exchange (login or register)
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    async fn exchange_credentials(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, GatewayError>;
}

/// Message exchange
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError>;
}

/// Both exchanges, as served by one backend
pub trait RemoteGateway: CredentialGateway + ChatGateway {}
impl<T: CredentialGateway + ChatGateway> RemoteGateway for T {}

#[async_trait]
impl<T: CredentialGateway + ?Sized> CredentialGateway for Arc<T> {
    async fn exchange_credentials(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, GatewayError> {
        (**self).exchange_credentials(mode, credentials).await
    }
}

#[async_trait]
impl<T: ChatGateway + ?Sized> ChatGateway for Arc<T> {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        (**self).ask(request).await
    }
}

/// Logging wrapper for gateways
pub struct LoggingGateway<G> {
    inner: G,
}

impl<G> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: CredentialGateway> CredentialGateway for LoggingGateway<G> {
    async fn exchange_credentials(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, GatewayError> {
        let start = Instant::now();
        let result = self.inner.exchange_credentials(mode, credentials).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    endpoint = mode.path(),
                    user = %credentials.username,
                    duration_ms = %duration.as_millis(),
                    success = reply.success,
                    elevated = reply.is_admin,
                    "Credential exchange completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = mode.path(),
                    user = %credentials.username,
                    duration_ms = %duration.as_millis(),
                    status = ?e.status,
                    error = %e.message,
                    "Credential exchange failed"
                );
            }
        }

        result
    }
}

#[async_trait]
impl<G: ChatGateway> ChatGateway for LoggingGateway<G> {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        let start = Instant::now();
        let result = self.inner.ask(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    message_chars = request.message.chars().count(),
                    duration_ms = %duration.as_millis(),
                    has_answer = reply.answer.is_some(),
                    sources = reply.sources.as_ref().map_or(0, Vec::len),
                    "Message exchange completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    message_chars = request.message.chars().count(),
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Message exchange failed"
                );
            }
        }

        result
    }
}
