//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GATEWAY_URL: &str = "https://eczaci-ai.onrender.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DURABLE_DB_FILE: &str = "storage.db";
const DATA_DIR_NAME: &str = ".eczaci-ai";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Gateway URL is empty")]
    EmptyGatewayUrl,
    #[error("Gateway URL must start with http:// or https://: {0}")]
    InvalidGatewayUrl(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gateway_url: String,
    pub http_timeout: Duration,
    /// Directory holding the durable tier database
    pub data_dir: PathBuf,
    /// Names the session tier; one per terminal session
    pub session_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gateway_url = normalize_base_url(
            &non_empty("ECZACI_GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
        )?;

        let http_timeout = match non_empty("ECZACI_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ECZACI_HTTP_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let data_dir = non_empty("ECZACI_DATA_DIR").map_or_else(
            || {
                let home = non_empty("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(DATA_DIR_NAME)
            },
            PathBuf::from,
        );

        let session_id = non_empty("ECZACI_SESSION_ID").unwrap_or_else(default_session_id);
        if !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                key: "ECZACI_SESSION_ID",
                value: session_id,
            });
        }

        Ok(Self {
            gateway_url,
            http_timeout,
            data_dir,
            session_id,
        })
    }

    pub fn durable_store_path(&self) -> PathBuf {
        self.data_dir.join(DURABLE_DB_FILE)
    }

    /// Session tier database; lives in the temp dir so it does not outlast the machine
    pub fn session_store_path(&self) -> PathBuf {
        std::env::temp_dir()
            .join("eczaci-ai")
            .join(format!("session-{}.db", self.session_id))
    }
}

/// The shell that launched us stands in for a browser tab
fn default_session_id() -> String {
    #[cfg(unix)]
    {
        std::os::unix::process::parent_id().to_string()
    }
    #[cfg(not(unix))]
    {
        std::process::id().to_string()
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyGatewayUrl);
    }
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return Err(ConfigError::InvalidGatewayUrl(trimmed.to_string()));
    };
    if !matches!(scheme, "http" | "https") || rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::InvalidGatewayUrl(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}
