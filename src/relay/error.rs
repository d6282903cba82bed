//! Callback error type definitions

use std::fmt;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::store::StoreError;

use super::exchange::ExchangeError;
use super::templates::render_error_page;

/// Ways a `/callback` request can fail
#[derive(Debug)]
pub enum CallbackError {
    /// The provider redirected back with `error=...`
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// No `code` query parameter
    MissingCode,

    /// No `state` query parameter
    MissingState,

    /// Client ID or secret not configured on the server
    MissingClientCredentials,

    /// The code-for-token exchange failed
    ExchangeFailed(ExchangeError),

    /// The token could not be written to the store
    StoreFailed(StoreError),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::ProviderDenied { error, description } => match description {
                Some(description) if !description.is_empty() => {
                    write!(f, "OAuth error: {} - {}", error, description)
                }
                _ => write!(f, "OAuth error: {}", error),
            },
            CallbackError::MissingCode => write!(f, "Missing authorization code"),
            CallbackError::MissingState => write!(f, "Missing state parameter"),
            CallbackError::MissingClientCredentials => {
                write!(f, "Server misconfigured - missing OAuth credentials")
            }
            CallbackError::ExchangeFailed(_) => {
                write!(f, "Failed to exchange authorization code for token")
            }
            CallbackError::StoreFailed(_) => {
                write!(f, "Failed to save the token, please try again")
            }
        }
    }
}

impl std::error::Error for CallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallbackError::ExchangeFailed(e) => Some(e),
            CallbackError::StoreFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl CallbackError {
    /// Get corresponding HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            CallbackError::ProviderDenied { .. }
            | CallbackError::MissingCode
            | CallbackError::MissingState => StatusCode::BAD_REQUEST,
            CallbackError::MissingClientCredentials
            | CallbackError::ExchangeFailed(_)
            | CallbackError::StoreFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            render_error_page(&self.to_string()),
        )
            .into_response()
    }
}
