//! Provider token exchange
//!
//! Redeems an authorization code at the identity provider's token endpoint
//! and turns the answer into a [`TokenRecord`]. Nothing here touches the
//! store: a failed exchange leaves no trace behind.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::http_client::{ProxyConfig, build_client};
use crate::model::config::{Config, OAuthClient};

use super::types::TokenRecord;

/// Lifetime assumed when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Exchange failures, by cause
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The token endpoint could not be reached or timed out
    #[error("token endpoint unreachable: {0}")]
    Network(String),

    /// The token endpoint answered with a non-2xx status
    #[error("token endpoint rejected the code (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// A 2xx answer that is not a usable token response
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Raw token endpoint answer
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl ProviderTokens {
    /// Absolute expiry of the access token as of `now`
    ///
    /// `None` when `expires_in` is negative or too large to represent.
    fn expiry_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        if expires_in < 0 {
            return None;
        }
        now.checked_add_signed(chrono::Duration::try_seconds(expires_in)?)
    }

    /// Build a fresh, unconsumed record as of `now`
    pub fn into_record(self, now: DateTime<Utc>) -> Result<TokenRecord, ExchangeError> {
        let expiry = self.expiry_after(now).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!(
                "expires_in out of range: {:?}",
                self.expires_in
            ))
        })?;
        Ok(TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            token_type: self
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expiry,
            consumed: false,
            created_at: now,
        })
    }
}

/// Code-for-token exchange with the identity provider
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        code: &str,
        client: &OAuthClient,
    ) -> Result<ProviderTokens, ExchangeError>;
}

/// Standard `authorization_code` grant over HTTP
pub struct HttpTokenExchanger {
    token_url: String,
    http: Client,
}

impl HttpTokenExchanger {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let proxy = ProxyConfig::from_config(config);
        let http = build_client(
            proxy.as_ref(),
            Duration::from_secs(config.exchange_timeout_secs),
            config.tls_backend,
        )?;
        Ok(Self::with_client(config.token_url.clone(), http))
    }

    pub fn with_client(token_url: impl Into<String>, http: Client) -> Self {
        Self {
            token_url: token_url.into(),
            http,
        }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        code: &str,
        client: &OAuthClient,
    ) -> Result<ProviderTokens, ExchangeError> {
        let form = [
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;
        let tokens: ProviderTokens = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;

        if tokens.access_token.is_empty() {
            return Err(ExchangeError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }
        if tokens.expiry_after(Utc::now()).is_none() {
            return Err(ExchangeError::InvalidResponse(format!(
                "expires_in out of range: {:?}",
                tokens.expires_in
            )));
        }

        Ok(tokens)
    }
}
