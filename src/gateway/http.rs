//! HTTP implementation of the remote gateway

use super::types::{AuthMode, AuthReply, ChatReply, ChatRequest, Credentials, ErrorBody};
use super::{ChatGateway, CredentialGateway, GatewayError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const CHAT_PATH: &str = "/api/chat";

/// Gateway talking JSON over HTTP to the answering service
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// `base_url` must already be normalized (scheme, no trailing slash)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    GatewayError::network(format!("Connection failed: {e}"))
                } else {
                    GatewayError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::timeout(format!("Timed out reading response: {e}"))
            } else {
                GatewayError::network(format!("Failed to read response: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(GatewayError::from_status(
                status.as_u16(),
                ErrorBody::detail_text(&text),
            ));
        }

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::decode(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl CredentialGateway for HttpGateway {
    async fn exchange_credentials(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, GatewayError> {
        self.post_json(mode.path(), credentials).await
    }
}

#[async_trait]
impl ChatGateway for HttpGateway {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        self.post_json(CHAT_PATH, request).await
    }
}
