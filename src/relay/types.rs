//! Token relay types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Stored token hand-off record
///
/// An empty `access_token` marks a record whose exchange has not completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// When the access token itself stops being valid
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_pending(&self) -> bool {
        self.access_token.is_empty()
    }

    /// Lifecycle state of a live record
    pub fn status(&self) -> TokenStatus {
        if self.consumed {
            TokenStatus::Consumed
        } else if self.is_pending() {
            TokenStatus::Pending
        } else {
            TokenStatus::Ready
        }
    }
}

/// Token lookup status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Ready,
    Pending,
    Consumed,
    NotFound,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Ready => "ready",
            TokenStatus::Pending => "pending",
            TokenStatus::Consumed => "consumed",
            TokenStatus::NotFound => "not_found",
        }
    }
}

/// `GET /status/{state}` body
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: TokenStatus,
}

/// `GET /token/{state}` body when the token is handed over
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expiry: String,
}

impl From<TokenRecord> for TokenResponse {
    fn from(record: TokenRecord) -> Self {
        Self {
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            token_type: record.token_type,
            expiry: record.expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// `202` body while the exchange is still pending
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub status: TokenStatus,
    pub message: String,
}

/// JSON error body used by the polling endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }

    pub fn bare(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }
}

/// `GET /health` body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}
