//! Gateway error types

use thiserror::Error;

/// Remote gateway error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Human-readable `detail` string from the error body, if any
    pub detail: Option<String>,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            detail: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Unknown, message)
    }

    /// Classify a non-2xx response
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let kind = if status >= 500 {
            GatewayErrorKind::Server
        } else {
            GatewayErrorKind::Rejected
        };
        let message = match &detail {
            Some(detail) => format!("HTTP {status}: {detail}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind,
            message,
            status: Some(status),
            detail,
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Connection refused, DNS, reset
    Network,
    /// Client timeout elapsed
    Timeout,
    /// 4xx answer (bad credentials, taken username, validation)
    Rejected,
    /// 5xx answer
    Server,
    /// 2xx answer with a body we could not decode
    Decode,
    /// Anything else, including a crashed exchange task
    Unknown,
}
