//! Error types for the OAuth token lifecycle
//!
//! `Error` is `Clone` because a single refresh outcome is shared by every
//! caller waiting on the in-flight refresh. Transport failures keep the
//! `reqwest::Error` behind an `Arc` for the same reason.

use std::sync::Arc;

/// Errors from authorization, code exchange, and refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid or expired state parameter")]
    InvalidState,

    #[error("failed to exchange code for token ({status}): {body}")]
    TokenExchange { status: u16, body: String },

    #[error("failed to refresh token ({status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("no access token available, authenticate first")]
    MissingAccessToken,

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("HTTP request to token endpoint failed: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("token storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Raw token-endpoint body for rejected exchanges and refreshes.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::TokenExchange { body, .. } | Error::RefreshRejected { body, .. } => Some(body),
            _ => None,
        }
    }

    /// HTTP status returned by the token endpoint, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenExchange { status, .. } | Error::RefreshRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
